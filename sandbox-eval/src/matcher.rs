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

//! Stage N: confirms the declared module name matches the caller's
//! expectation and locates the requested `function/arity` (spec §4.4).

use crate::error::{EvalError, EvalResult};
use crate::shape::ModuleShape;
use sandbox_ast::{Node, NodeKind};

/// A located function: its formal parameter patterns (in order, with the
/// bound-name subset callers use for I4), its optional `when` guard, and
/// its body.
#[derive(Debug)]
pub struct MatchedFunction<'a> {
    pub params: &'a [Node],
    pub guard: Option<&'a Node>,
    pub body: &'a Node,
}

pub fn match_module_name(shape: &ModuleShape<'_>, expected: &str) -> EvalResult<()> {
    let actual = shape.name.join(".");
    if actual != expected {
        return Err(EvalError::ModuleNameMismatch {
            expected: expected.to_owned(),
            actual,
        });
    }
    Ok(())
}

/// All `def`/`defp` heads declared directly in the module, as
/// `(name, arity)` pairs. Used by stage V to resolve local recursive
/// calls without re-walking the statement list.
pub fn declared_functions<'a>(shape: &ModuleShape<'a>) -> Vec<(&'a str, u32)> {
    shape
        .statements
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            NodeKind::Def { name, params, .. } => Some((name.as_str(), params.len() as u32)),
            _ => None,
        })
        .collect()
}

pub fn match_function<'a>(
    shape: &'a ModuleShape<'a>,
    function: &str,
    arity: u32,
) -> EvalResult<MatchedFunction<'a>> {
    let defs: Vec<_> = shape
        .statements
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            NodeKind::Def {
                name,
                params,
                guard,
                body,
                ..
            } => Some((name.as_str(), params, guard, body.as_ref())),
            _ => None,
        })
        .collect();

    if let Some((_, params, guard, body)) = defs
        .iter()
        .find(|(name, params, ..)| *name == function && params.len() as u32 == arity)
    {
        return Ok(MatchedFunction {
            params,
            guard: guard.as_deref(),
            body,
        });
    }

    Err(EvalError::FunctionNotFound {
        name: function.to_owned(),
        arity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::shape::validate_shape;

    #[test]
    fn matches_module_name_and_function() {
        let src = "defmodule Calculator do\n  def add_tax(price) do price end\nend";
        let root = parse(src).unwrap();
        let shape = validate_shape(&root).unwrap();
        assert!(match_module_name(&shape, "Calculator").is_ok());
        let found = match_function(&shape, "add_tax", 1).unwrap();
        assert_eq!(found.params.len(), 1);
    }

    #[test]
    fn rejects_module_name_mismatch() {
        let src = "defmodule Calculator do\n  def add_tax(price) do price end\nend";
        let root = parse(src).unwrap();
        let shape = validate_shape(&root).unwrap();
        assert_eq!(
            match_module_name(&shape, "Other").unwrap_err(),
            EvalError::ModuleNameMismatch {
                expected: "Other".to_owned(),
                actual: "Calculator".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_arity_mismatch() {
        let src = "defmodule M do\n  def greet(name) do name end\nend";
        let root = parse(src).unwrap();
        let shape = validate_shape(&root).unwrap();
        assert_eq!(
            match_function(&shape, "greet", 2).unwrap_err(),
            EvalError::FunctionNotFound {
                name: "greet".to_owned(),
                arity: 2,
            }
        );
    }
}
