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

//! Pipeline-only end-to-end scenarios against the public `Sandbox` API,
//! using a minimal stub `Host` so the tests stay scoped to stages L–N–V
//! rather than full execution (covered separately in `sandbox-host`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sandbox_ast::{NodeKind, Value};
use sandbox_eval::{EvalOptions, Host, ModuleHandle, Sandbox};

struct EchoHost {
    next_id: AtomicU64,
    modules: Mutex<HashMap<u64, sandbox_ast::Node>>,
}

impl EchoHost {
    fn new() -> Self {
        EchoHost {
            next_id: AtomicU64::new(1),
            modules: Mutex::new(HashMap::new()),
        }
    }
}

impl Host for EchoHost {
    fn install(&self, _module_id: &str, module_ast: &sandbox_ast::Node) -> Result<ModuleHandle, String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.modules.lock().insert(id, module_ast.clone());
        Ok(ModuleHandle(id))
    }

    fn invoke(&self, handle: ModuleHandle, function_id: &str, args: &[Value]) -> Result<Value, String> {
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

fn sandbox() -> Sandbox<EchoHost> {
    Sandbox::new(EchoHost::new())
}

#[test]
fn admitted_source_reaches_the_host() {
    let source = b"defmodule Calculator do\n  def add_tax(price) do price end\nend";
    let result = sandbox().eval_ephemeral(source, "Calculator", "add_tax", vec![Value::Integer(7)]);
    assert_eq!(result, Ok(Value::Integer(7)));
}

#[test]
fn module_name_mismatch_is_rejected() {
    let source = b"defmodule Calculator do\n  def add_tax(price) do price end\nend";
    let err = sandbox()
        .eval_ephemeral(source, "WrongName", "add_tax", vec![Value::Integer(1)])
        .unwrap_err();
    similar_asserts::assert_eq!(
        err,
        "Module name mismatch. Expected WrongName, got Calculator".to_owned()
    );
}

#[test]
fn forbidden_qualified_call_is_rejected_before_install() {
    let source =
        b"defmodule M do\n  def read_file(path) do\n    File.read!(path)\n  end\nend";
    let result = sandbox().eval_ephemeral(source, "M", "read_file", vec![Value::Str("x".into())]);
    assert_eq!(result, Err("Line 3: Forbidden function: File.read!".to_owned()));
}

#[test]
fn oversized_source_is_rejected_by_the_prefilter() {
    let mut source = b"defmodule M do\n  def f() do\n".to_vec();
    source.extend(std::iter::repeat(b'a').take(200_000));
    source.extend_from_slice(b"\n  end\nend");
    let err = sandbox()
        .eval_ephemeral(&source, "M", "f", vec![])
        .unwrap_err();
    assert_eq!(err, "Code size exceeds maximum limit");
}

#[test]
fn persistent_mode_populates_and_evicts_the_cache() {
    let source = b"defmodule M do\n  def identity(x) do x end\nend";
    let sandbox = sandbox();
    assert_eq!(sandbox.cache_len(), 0);
    sandbox
        .eval_persistent(source, "M", "identity", vec![Value::Integer(1)])
        .unwrap();
    assert_eq!(sandbox.cache_len(), 1);
    sandbox.clear_cache("M");
    assert_eq!(sandbox.cache_len(), 0);
}
