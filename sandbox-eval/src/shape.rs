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

//! Stage S: confirms the parsed tree is exactly one module of
//! definitions and attributes, nothing else (spec §4.3).

use crate::error::{EvalError, EvalResult};
use sandbox_ast::{Node, NodeKind};

/// The accepted shape of a module body: the `defmodule`'s name segments
/// plus its flattened top-level statements (already unwrapped out of any
/// `Block`).
#[derive(Debug)]
pub struct ModuleShape<'a> {
    pub name: &'a [String],
    pub statements: &'a [Node],
}

pub fn validate_shape(root: &Node) -> EvalResult<ModuleShape<'_>> {
    let NodeKind::Defmodule { name, body } = &root.kind else {
        return Err(EvalError::Parse {
            line: root.line,
            message: "expected a defmodule at the top level".to_owned(),
        });
    };

    let statements: &[Node] = match &body.kind {
        NodeKind::Block(stmts) => stmts.as_slice(),
        _ => std::slice::from_ref(body.as_ref()),
    };

    for statement in statements {
        check_statement_shape(statement)?;
    }

    Ok(ModuleShape { name, statements })
}

fn check_statement_shape(statement: &Node) -> EvalResult<()> {
    let line = statement.line;
    match &statement.kind {
        NodeKind::Def { .. } | NodeKind::Attribute { .. } => Ok(()),
        NodeKind::Defmodule { .. } => Err(EvalError::NestedModule { line }),
        NodeKind::Alias => Err(EvalError::AliasNotAllowed { line }),
        NodeKind::Import => Err(EvalError::ImportNotAllowed { line }),
        NodeKind::Require => Err(EvalError::RequireNotAllowed { line }),
        NodeKind::Use => Err(EvalError::UseNotAllowed { line }),
        _ => Err(EvalError::TopLevelExpression { line }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn accepts_module_with_only_defs_and_attributes() {
        let src = "defmodule M do\n  @moduledoc \"x\"\n  def f(x) do x end\nend";
        let root = parse(src).unwrap();
        assert!(validate_shape(&root).is_ok());
    }

    #[test]
    fn rejects_nested_module() {
        let src = "defmodule Outer do\n  defmodule Inner do\n    def f(x) do x end\n  end\nend";
        let root = parse(src).unwrap();
        assert_eq!(
            validate_shape(&root).unwrap_err(),
            EvalError::NestedModule { line: 2 }
        );
    }

    #[test]
    fn rejects_top_level_expression() {
        let src = "defmodule M do\n  1 + 1\nend";
        let root = parse(src).unwrap();
        assert_eq!(
            validate_shape(&root).unwrap_err(),
            EvalError::TopLevelExpression { line: 2 }
        );
    }

    #[test]
    fn rejects_alias_import_require_use() {
        for (src, expected) in [
            (
                "defmodule M do\n  alias Foo.Bar\n  def f(x) do x end\nend",
                EvalError::AliasNotAllowed { line: 2 },
            ),
            (
                "defmodule M do\n  import Foo\n  def f(x) do x end\nend",
                EvalError::ImportNotAllowed { line: 2 },
            ),
            (
                "defmodule M do\n  require Foo\n  def f(x) do x end\nend",
                EvalError::RequireNotAllowed { line: 2 },
            ),
            (
                "defmodule M do\n  use Foo\n  def f(x) do x end\nend",
                EvalError::UseNotAllowed { line: 2 },
            ),
        ] {
            let root = parse(src).unwrap();
            assert_eq!(validate_shape(&root).unwrap_err(), expected);
        }
    }
}
