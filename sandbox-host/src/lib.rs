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

//! The default [`sandbox_eval::Host`] implementation: a tree-walking
//! interpreter over the already-admitted AST, plus the kernel and
//! qualified-module builtins it dispatches to.
//!
//! Consumers who want a different execution strategy (bytecode, a
//! different sandboxing boundary) implement `Host` themselves; this crate
//! just ships a working default the way the teacher's `evm` crate ships
//! a concrete `Runner` alongside the pallet that only depends on its
//! trait.

pub mod builtins;
pub mod error;
pub mod interpreter;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use std::collections::HashMap;

use sandbox_ast::{Node, Value};
use sandbox_eval::{Host, ModuleHandle};

use crate::error::HostError;
use crate::interpreter::Interpreter;

/// Installs modules by storing their (already-admitted) AST and handing out
/// a monotonic [`ModuleHandle`]; invocation builds a fresh [`Interpreter`]
/// borrowing that stored AST on every call, since clause bodies are walked
/// by reference rather than compiled ahead of time.
#[derive(Default)]
pub struct TreeWalkHost {
    next_handle: AtomicU64,
    modules: Mutex<HashMap<u64, Node>>,
}

impl TreeWalkHost {
    pub fn new() -> Self {
        TreeWalkHost {
            next_handle: AtomicU64::new(1),
            modules: Mutex::new(HashMap::new()),
        }
    }
}

impl Host for TreeWalkHost {
    fn install(&self, module_id: &str, module_ast: &Node) -> Result<ModuleHandle, String> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        log::debug!("installing module {module_id} as handle {id}");
        self.modules.lock().insert(id, module_ast.clone());
        Ok(ModuleHandle(id))
    }

    fn invoke(&self, handle: ModuleHandle, function_id: &str, args: &[Value]) -> Result<Value, String> {
        let modules = self.modules.lock();
        let module = modules
            .get(&handle.0)
            .ok_or_else(|| HostError::ModuleNotInstalled.to_string())?;
        let interpreter = Interpreter::new(module).map_err(|e| e.to_string())?;
        interpreter.invoke(function_id, args).map_err(|e| e.to_string())
    }

    fn purge(&self, handle: ModuleHandle) {
        log::debug!("purging handle {}", handle.0);
        self.modules.lock().remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_eval::{EvalOptions, Sandbox};

    fn sandbox() -> Sandbox<TreeWalkHost> {
        Sandbox::new(TreeWalkHost::new())
    }

    #[test]
    fn evaluates_arithmetic_pipeline_end_to_end() {
        let source = br#"
            defmodule Pricing do
              def total(price, tax_rate) do
                tax = price * tax_rate
                %{price: price, tax: tax, total: price + tax}
              end
            end
        "#;
        let sandbox = sandbox();
        let result = sandbox
            .eval(
                source,
                "Pricing",
                "total",
                vec![Value::Float(100.0), Value::Float(0.2)],
                EvalOptions::default(),
            )
            .expect("evaluation should succeed");

        match result {
            Value::Map(entries) => {
                assert_eq!(entries.len(), 3);
                let total = entries
                    .iter()
                    .find(|(k, _)| *k == Value::Atom("total".to_owned()))
                    .map(|(_, v)| v.clone());
                assert_eq!(total, Some(Value::Float(120.0)));
            }
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn evaluates_recursive_fibonacci() {
        let source = br#"
            defmodule Fib do
              def fib(n) do
                case n do
                  0 -> 0
                  1 -> 1
                  _ -> fib(n - 1) + fib(n - 2)
                end
              end
            end
        "#;
        let sandbox = sandbox();
        let result = sandbox
            .eval(
                source,
                "Fib",
                "fib",
                vec![Value::Integer(10)],
                EvalOptions::default(),
            )
            .expect("evaluation should succeed");
        assert_eq!(result, Value::Integer(55));
    }

    #[test]
    fn rejects_forbidden_qualified_call_before_reaching_the_host() {
        let source =
            b"defmodule Leaky do\n  def read(path) do\n    File.read!(path)\n  end\nend";
        let sandbox = sandbox();
        let err = sandbox
            .eval(
                source,
                "Leaky",
                "read",
                vec![Value::Str("/etc/passwd".to_owned())],
                EvalOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err, "Line 3: Forbidden function: File.read!");
    }

    #[test]
    fn surfaces_division_by_zero_as_a_runtime_error() {
        let source = br#"
            defmodule Math do
              def divide(a, b) do
                a / b
              end
            end
        "#;
        let sandbox = sandbox();
        let err = sandbox
            .eval(
                source,
                "Math",
                "divide",
                vec![Value::Integer(1), Value::Integer(0)],
                EvalOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err, "division by zero");
    }
}
