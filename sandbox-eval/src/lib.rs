// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The static sandbox pipeline (L → P → S → N → V → R, with C consulted
//! ahead of P in persistent mode) and its public entry point, [`Sandbox`].
//!
//! Internally every stage returns the structured [`EvalError`]; the public
//! [`Sandbox::eval`] flattens it to `Result<Value, String>` at the
//! boundary, matching the rest of this workspace's `Err(kind, message,
//! line?)`-internally/flat-externally convention.

pub mod cache;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod prefilter;
pub mod runtime;
pub mod shape;
pub mod validate;

use std::collections::HashSet;

pub use error::{ErrorKind, EvalError};
pub use prefilter::SandboxLimits;
pub use runtime::{Host, ModuleHandle, RuntimeAdaptor};
pub use sandbox_ast::{Value, Whitelist};

use cache::ModuleCache;
use matcher::{declared_functions, match_function, match_module_name};
use shape::validate_shape;
use validate::Validator;

/// Stands in for the spec's "unforgeable symbol" precondition on the
/// `module_id` parameter: a thin newtype rather than a raw `String`, since
/// Rust has no interned-atom type in `std` (see Open Question OQ-3 in
/// `SPEC_FULL.md`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(pub String);

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        ModuleId(s.to_owned())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        ModuleId(s)
    }
}

/// See [`ModuleId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId(pub String);

impl From<&str> for FunctionId {
    fn from(s: &str) -> Self {
        FunctionId(s.to_owned())
    }
}

impl From<String> for FunctionId {
    fn from(s: String) -> Self {
        FunctionId(s)
    }
}

/// Per-call options (spec §3, "Call site").
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    pub persistent: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions { persistent: true }
    }
}

/// The sandbox: whitelist tables, prefilter limits, module cache and
/// runtime adaptor, all built once and shared across concurrent `eval`
/// calls (spec §5).
pub struct Sandbox<H> {
    whitelist: Whitelist,
    limits: SandboxLimits,
    cache: ModuleCache,
    runtime: RuntimeAdaptor<H>,
}

impl<H: Host> Sandbox<H> {
    pub fn new(host: H) -> Self {
        Sandbox {
            whitelist: Whitelist::standard(),
            limits: SandboxLimits::default(),
            cache: ModuleCache::new(),
            runtime: RuntimeAdaptor::new(host),
        }
    }

    pub fn with_limits(host: H, limits: SandboxLimits) -> Self {
        Sandbox {
            whitelist: Whitelist::standard(),
            limits,
            cache: ModuleCache::new(),
            runtime: RuntimeAdaptor::new(host),
        }
    }

    /// The single entry point (spec §6): parse, statically admit or reject,
    /// and — if admitted — run `function` with `args`.
    pub fn eval(
        &self,
        code: &[u8],
        module: impl Into<ModuleId>,
        function: impl Into<FunctionId>,
        args: Vec<Value>,
        opts: EvalOptions,
    ) -> Result<Value, String> {
        let module = module.into();
        let function = function.into();
        self.eval_inner(code, &module, &function, args, opts)
            .map_err(|err| err.to_string())
    }

    pub fn eval_ephemeral(
        &self,
        code: &[u8],
        module: impl Into<ModuleId>,
        function: impl Into<FunctionId>,
        args: Vec<Value>,
    ) -> Result<Value, String> {
        self.eval(
            code,
            module,
            function,
            args,
            EvalOptions { persistent: false },
        )
    }

    pub fn eval_persistent(
        &self,
        code: &[u8],
        module: impl Into<ModuleId>,
        function: impl Into<FunctionId>,
        args: Vec<Value>,
    ) -> Result<Value, String> {
        self.eval(
            code,
            module,
            function,
            args,
            EvalOptions { persistent: true },
        )
    }

    /// Evicts `module_id` from the cache and asks the host to purge the
    /// module it pointed to, if any. Operational escape hatch for the
    /// cache's keyed-by-`module_id`-only behavior (Open Question OQ-2).
    pub fn clear_cache(&self, module_id: &str) {
        if let Some(handle) = self.cache.remove(module_id) {
            self.runtime.purge(handle);
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn eval_inner(
        &self,
        code: &[u8],
        module: &ModuleId,
        function: &FunctionId,
        args: Vec<Value>,
        opts: EvalOptions,
    ) -> Result<Value, EvalError> {
        let arity = args.len() as u32;

        if opts.persistent {
            if let Some(handle) = self.cache.lookup(&module.0, &function.0, arity) {
                log::trace!("cache hit for module {:?}", module.0);
                return self
                    .runtime
                    .invoke(handle, &function.0, &args)
                    .map_err(EvalError::Runtime);
            }
        }

        let source = prefilter::prefilter(code, &self.limits)?;
        let root = parser::parse(source)?;
        let shape = validate_shape(&root)?;
        match_module_name(&shape, &module.0)?;
        let found = match_function(&shape, &function.0, arity)?;
        let local_defs = declared_functions(&shape);
        let validator = Validator::new(&self.whitelist, &local_defs);
        validator.validate_function(found.params, found.guard, found.body)?;

        let handle = self
            .runtime
            .install(&module.0, &root)
            .map_err(EvalError::Runtime)?;
        let result = self.runtime.invoke(handle, &function.0, &args);

        if opts.persistent {
            let exports: HashSet<(String, u32)> = local_defs
                .iter()
                .map(|(name, arity)| ((*name).to_owned(), *arity))
                .collect();
            self.cache.insert(module.0.clone(), handle, exports);
        } else {
            self.runtime.purge(handle);
        }

        result.map_err(EvalError::Runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;
    use sandbox_ast::NodeKind;

    /// A minimal host used only to exercise the pipeline wiring; it is not
    /// the tree-walk interpreter (that lives in `sandbox-host`), just
    /// enough to prove `Sandbox::eval` installs/invokes/purges correctly.
    struct StubHost {
        next_id: AtomicU64,
        modules: Mutex<HashMap<u64, sandbox_ast::Node>>,
    }

    impl StubHost {
        fn new() -> Self {
            StubHost {
                next_id: AtomicU64::new(1),
                modules: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Host for StubHost {
        fn install(&self, _module_id: &str, module_ast: &sandbox_ast::Node) -> Result<ModuleHandle, String> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.modules.lock().insert(id, module_ast.clone());
            Ok(ModuleHandle(id))
        }

        fn invoke(
            &self,
            handle: ModuleHandle,
            function_id: &str,
            args: &[Value],
        ) -> Result<Value, String> {
            let modules = self.modules.lock();
            let module = modules.get(&handle.0).ok_or("module not installed")?;
            let NodeKind::Defmodule { body, .. } = &module.kind else {
                return Err("not a module".to_owned());
            };
            let statements = match &body.kind {
                NodeKind::Block(stmts) => stmts.as_slice(),
                _ => std::slice::from_ref(body.as_ref()),
            };
            for stmt in statements {
                if let NodeKind::Def { name, params, .. } = &stmt.kind {
                    if name == function_id && params.len() == args.len() {
                        // Stub evaluation: only supports returning the sole
                        // argument unchanged, enough to prove plumbing.
                        return Ok(args.first().cloned().unwrap_or(Value::Nil));
                    }
                }
            }
            Err("function not found at runtime".to_owned())
        }

        fn purge(&self, handle: ModuleHandle) {
            self.modules.lock().remove(&handle.0);
        }
    }

    #[test]
    fn eval_runs_admitted_function_end_to_end() {
        let sandbox = Sandbox::new(StubHost::new());
        let code = b"defmodule M do\n  def identity(x) do x end\nend";
        let result = sandbox.eval_ephemeral(code, "M", "identity", vec![Value::Integer(42)]);
        assert_eq!(result, Ok(Value::Integer(42)));
    }

    #[test]
    fn eval_rejects_forbidden_call_before_reaching_host() {
        let sandbox = Sandbox::new(StubHost::new());
        let code =
            b"defmodule M do\n  def read_file(path) do\n    File.read!(path)\n  end\nend";
        let result = sandbox.eval_ephemeral(code, "M", "read_file", vec![Value::Str("x".into())]);
        assert_eq!(result, Err("Line 3: Forbidden function: File.read!".to_owned()));
    }

    #[test]
    fn persistent_mode_populates_cache() {
        let sandbox = Sandbox::new(StubHost::new());
        let code = b"defmodule M do\n  def identity(x) do x end\nend";
        assert_eq!(sandbox.cache_len(), 0);
        sandbox
            .eval_persistent(code, "M", "identity", vec![Value::Integer(1)])
            .unwrap();
        assert_eq!(sandbox.cache_len(), 1);
        sandbox.clear_cache("M");
        assert_eq!(sandbox.cache_len(), 0);
    }
}
