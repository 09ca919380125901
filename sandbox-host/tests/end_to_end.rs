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

//! End-to-end scenarios against the public `Sandbox<TreeWalkHost>` API
//! only, exercising full source in and `Value`/`String` out.

use sandbox_ast::Value;
use sandbox_eval::{EvalOptions, Sandbox};
use sandbox_host::TreeWalkHost;

fn sandbox() -> Sandbox<TreeWalkHost> {
    Sandbox::new(TreeWalkHost::new())
}

#[test]
fn happy_path_pricing_pipeline() {
    let source = br#"
        defmodule Pricing do
          def total(price, tax_rate) do
            tax = price * tax_rate
            %{price: price, tax: tax, total: price + tax}
          end
        end
    "#;
    let result = sandbox()
        .eval(
            source,
            "Pricing",
            "total",
            vec![Value::Float(50.0), Value::Float(0.1)],
            EvalOptions::default(),
        )
        .expect("evaluation should succeed");

    let Value::Map(entries) = result else {
        panic!("expected a map result");
    };
    let total = entries
        .iter()
        .find(|(k, _)| *k == Value::Atom("total".to_owned()))
        .map(|(_, v)| v.clone());
    similar_asserts::assert_eq!(total, Some(Value::Float(55.0)));
}

#[test]
fn recursive_fibonacci_end_to_end() {
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
    let result = sandbox()
        .eval(
            source,
            "Fib",
            "fib",
            vec![Value::Integer(12)],
            EvalOptions::default(),
        )
        .expect("evaluation should succeed");
    assert_eq!(result, Value::Integer(144));
}

#[test]
fn forbidden_call_is_rejected_before_execution() {
    let source =
        b"defmodule Leaky do\n  def read(path) do\n    File.read!(path)\n  end\nend";
    let err = sandbox()
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
fn parameter_reassignment_is_rejected() {
    let source = b"defmodule M do\n  def increment(x) do\n    x = x + 1\n    x\n  end\nend";
    let err = sandbox()
        .eval(
            source,
            "M",
            "increment",
            vec![Value::Integer(1)],
            EvalOptions::default(),
        )
        .unwrap_err();
    assert!(err.contains("x"), "error should name the reassigned parameter: {err}");
}

#[test]
fn nested_module_is_rejected() {
    let source = b"defmodule Outer do\n  defmodule Inner do\n    def f() do 1 end\n  end\nend";
    let err = sandbox()
        .eval(source, "Outer", "f", vec![], EvalOptions::default())
        .unwrap_err();
    assert!(err.contains("Nested modules"), "got: {err}");
}

#[test]
fn arity_mismatch_is_reported_as_function_not_found() {
    let source = b"defmodule M do\n  def greet(name) do name end\nend";
    let err = sandbox()
        .eval(source, "M", "greet", vec![], EvalOptions::default())
        .unwrap_err();
    assert!(err.contains("greet/0"), "got: {err}");
}

#[test]
fn runtime_exception_surfaces_as_an_error_string() {
    let source = br#"
        defmodule Math do
          def divide(a, b) do
            a / b
          end
        end
    "#;
    let err = sandbox()
        .eval(
            source,
            "Math",
            "divide",
            vec![Value::Integer(4), Value::Integer(0)],
            EvalOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err, "division by zero");
}

#[test]
fn persistent_eval_reuses_the_installed_module_on_cache_hit() {
    let source = b"defmodule Counter do\n  def bump(x) do x + 1 end\nend";
    let sandbox = sandbox();
    assert_eq!(sandbox.cache_len(), 0);
    let first = sandbox
        .eval_persistent(source, "Counter", "bump", vec![Value::Integer(1)])
        .unwrap();
    assert_eq!(first, Value::Integer(2));
    assert_eq!(sandbox.cache_len(), 1);

    // Second call for the same module_id hits the cache and skips re-parsing
    // entirely, so even a `code` argument that would fail to parse is fine.
    let second = sandbox
        .eval_persistent(b"not even valid source", "Counter", "bump", vec![Value::Integer(41)])
        .unwrap();
    assert_eq!(second, Value::Integer(42));
}
