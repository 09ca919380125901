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

//! Stage V: the whitelist validator, the core of the sandbox (spec §4.5).
//!
//! Walks a function body in post-order with an environment of bound names
//! threaded through recursion, admitting only whitelisted forms. Anything
//! that does not match one of the admission rules below is rejected with
//! `"Forbidden expression"` tagged with the offending node's line.

use std::collections::HashSet;

use crate::error::{EvalError, EvalResult};
use sandbox_ast::{Clause, CondClause, Node, NodeKind, WithClause};
use sandbox_ast::{ModuleRef, Whitelist};

/// Names bound in the current function: formal parameters (fixed for the
/// whole walk) plus locals accumulated by `case`/`fn`/`with`/`=` as the walk
/// descends. Scopes are pushed by cloning `locals` and popped by
/// discarding the clone, which keeps the implementation simple at the cost
/// of an extra `HashSet` allocation per binding scope — acceptable given
/// the small size of sandboxed function bodies.
struct Env<'a> {
    params: &'a HashSet<String>,
    locals: HashSet<String>,
}

impl<'a> Env<'a> {
    fn is_bound(&self, name: &str) -> bool {
        self.params.contains(name) || self.locals.contains(name)
    }

    fn child(&self) -> Env<'a> {
        Env {
            params: self.params,
            locals: self.locals.clone(),
        }
    }
}

pub struct Validator<'a> {
    whitelist: &'a Whitelist,
    local_defs: &'a [(&'a str, u32)],
}

impl<'a> Validator<'a> {
    pub fn new(whitelist: &'a Whitelist, local_defs: &'a [(&'a str, u32)]) -> Self {
        Validator {
            whitelist,
            local_defs,
        }
    }

    pub fn validate_function(
        &self,
        params: &[Node],
        guard: Option<&Node>,
        body: &Node,
    ) -> EvalResult<()> {
        let param_names = collect_bound_names(params);
        let mut env = Env {
            params: &param_names,
            locals: HashSet::new(),
        };
        if let Some(guard) = guard {
            self.validate_guard(guard, &env)?;
        }
        self.validate_node(body, &mut env)
    }

    fn is_local_function(&self, name: &str, arity: u32) -> bool {
        self.local_defs
            .iter()
            .any(|(n, a)| *n == name && *a == arity)
    }

    fn validate_guard(&self, node: &Node, env: &Env<'a>) -> EvalResult<()> {
        if let NodeKind::Call { module: Some(module), name, .. } = &node.kind {
            // Guards admit kernel guards only (spec §4.5); a qualified call is
            // never a kernel guard, so reject it here rather than falling
            // through to the general validator's wider whitelist.
            return Err(EvalError::ForbiddenFunction {
                line: node.line,
                target: format!("{}.{}", module.as_str(), name),
            });
        }
        if let NodeKind::Call {
            module: None,
            name,
            args,
        } = &node.kind
        {
            if !self.whitelist.is_kernel_guard(name, args.len() as u32) {
                return Err(EvalError::ForbiddenFunction {
                    line: node.line,
                    target: format!("{name}/{}", args.len()),
                });
            }
            for arg in args {
                self.validate_node(arg, &mut env.child())?;
            }
            return Ok(());
        }
        if let NodeKind::Op { op, args } = &node.kind {
            if !self.whitelist.is_operator(op) {
                return Err(EvalError::ForbiddenExpression { line: node.line });
            }
            for arg in args {
                self.validate_guard(arg, env)?;
            }
            return Ok(());
        }
        self.validate_node(node, &mut env.child())
    }

    fn validate_node(&self, node: &Node, env: &mut Env<'a>) -> EvalResult<()> {
        let line = node.line;
        match &node.kind {
            NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::Atom(_)
            | NodeKind::Bool(_)
            | NodeKind::Nil
            | NodeKind::Bitstring(_) => Ok(()),

            NodeKind::Str(parts) => {
                for part in parts {
                    if let sandbox_ast::StringPart::Interpolated(inner) = part {
                        self.validate_node(inner, env)?;
                    }
                }
                Ok(())
            }

            NodeKind::Ident(name) => {
                if env.is_bound(name) || self.is_local_function(name, 0) {
                    Ok(())
                } else {
                    Err(EvalError::ForbiddenExpression { line })
                }
            }

            NodeKind::Match { pattern, value } => {
                self.validate_node(value, env)?;
                let bound = collect_bound_names_node(pattern);
                for name in &bound {
                    if env.params.contains(name) {
                        return Err(EvalError::ParamReassignment {
                            line,
                            name: name.clone(),
                        });
                    }
                }
                self.validate_pattern(pattern, env)?;
                env.locals.extend(bound);
                Ok(())
            }

            NodeKind::Op { op, args } => {
                if !self.whitelist.is_operator(op) {
                    return Err(EvalError::ForbiddenExpression { line });
                }
                for arg in args {
                    self.validate_node(arg, env)?;
                }
                Ok(())
            }

            NodeKind::Pipe { lhs, rhs } => {
                self.validate_node(lhs, env)?;
                // `a |> f(b)` resolves as `f(a, b)`: validate the rewritten
                // call directly so whitelist resolution sees the real
                // target while the error still carries the pipe's line.
                match &rhs.kind {
                    NodeKind::Call { module, name, args } => {
                        // `a |> f(b)` resolves to `f(a, b)`: the piped-in
                        // value becomes an implicit leading argument, so the
                        // admitted arity is one more than the explicit
                        // argument list the parser captured.
                        self.validate_call(module.as_ref(), name, args.len() as u32 + 1, line)?;
                        for arg in args {
                            self.validate_node(arg, env)?;
                        }
                        Ok(())
                    }
                    _ => Err(EvalError::ForbiddenExpression { line: rhs.line }),
                }
            }

            NodeKind::Call { module, name, args } => {
                self.validate_call(module.as_ref(), name, args.len() as u32, line)?;
                for arg in args {
                    self.validate_node(arg, env)?;
                }
                Ok(())
            }

            NodeKind::Capture { module, name, arity } => {
                self.validate_call(module.as_ref(), name, *arity, line)?;
                Ok(())
            }

            NodeKind::ListCons { items, tail } => {
                for item in items {
                    self.validate_node(item, env)?;
                }
                if let Some(tail) = tail {
                    self.validate_node(tail, env)?;
                }
                Ok(())
            }

            NodeKind::Tuple(items) => {
                for item in items {
                    self.validate_node(item, env)?;
                }
                Ok(())
            }

            NodeKind::MapLiteral(entries) => {
                for (k, v) in entries {
                    self.validate_node(k, env)?;
                    self.validate_node(v, env)?;
                }
                Ok(())
            }

            NodeKind::MapUpdate { base, entries } => {
                self.validate_node(base, env)?;
                for (k, v) in entries {
                    self.validate_node(k, env)?;
                    self.validate_node(v, env)?;
                }
                Ok(())
            }

            NodeKind::Sigil { letter, .. } => {
                if self.whitelist.is_sigil(*letter) {
                    Ok(())
                } else {
                    Err(EvalError::ForbiddenExpression { line })
                }
            }

            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.validate_node(stmt, env)?;
                }
                Ok(())
            }

            NodeKind::Fn(clauses) => self.validate_clauses(clauses, env),

            NodeKind::Case { subject, clauses } => {
                self.validate_node(subject, env)?;
                self.validate_clauses(clauses, env)
            }

            NodeKind::Cond(clauses) => self.validate_cond_clauses(clauses, env),

            NodeKind::With {
                clauses,
                body,
                else_clauses,
            } => {
                let mut scope = env.child();
                for WithClause { pattern, expr } in clauses {
                    self.validate_node(expr, &mut scope)?;
                    self.validate_pattern(pattern, &mut scope)?;
                    scope.locals.extend(collect_bound_names_node(pattern));
                }
                self.validate_node(body, &mut scope)?;
                self.validate_clauses(else_clauses, env)
            }

            NodeKind::Attribute { value, .. } => {
                // OQ-4: attribute RHS is validated with the same rules as any
                // other expression rather than admitted unconditionally.
                self.validate_node(value, &mut env.child())
            }

            NodeKind::Def { .. } | NodeKind::Defmodule { .. } => {
                Err(EvalError::NestedDefinition { line })
            }

            NodeKind::Alias | NodeKind::Import | NodeKind::Require | NodeKind::Use => {
                Err(EvalError::ForbiddenExpression { line })
            }
        }
    }

    /// Patterns (left side of `=`, `case`/`with` clause heads, function
    /// parameters) are walked with the same admission rules as expressions,
    /// since literals, identifiers, tuples/lists/maps are the only forms the
    /// parser produces in pattern position.
    fn validate_pattern(&self, pattern: &Node, env: &mut Env<'a>) -> EvalResult<()> {
        match &pattern.kind {
            NodeKind::Ident(_) => Ok(()),
            NodeKind::Tuple(items) => {
                for item in items {
                    self.validate_pattern(item, env)?;
                }
                Ok(())
            }
            NodeKind::ListCons { items, tail } => {
                for item in items {
                    self.validate_pattern(item, env)?;
                }
                if let Some(tail) = tail {
                    self.validate_pattern(tail, env)?;
                }
                Ok(())
            }
            NodeKind::MapLiteral(entries) => {
                for (k, v) in entries {
                    self.validate_node(k, env)?;
                    self.validate_pattern(v, env)?;
                }
                Ok(())
            }
            NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::Atom(_)
            | NodeKind::Bool(_)
            | NodeKind::Nil
            | NodeKind::Bitstring(_) => Ok(()),
            _ => self.validate_node(pattern, env),
        }
    }

    fn validate_clauses(&self, clauses: &[Clause], env: &Env<'a>) -> EvalResult<()> {
        for Clause {
            patterns,
            guard,
            body,
        } in clauses
        {
            let mut scope = env.child();
            for pattern in patterns {
                self.validate_pattern(pattern, &mut scope)?;
                scope.locals.extend(collect_bound_names_node(pattern));
            }
            if let Some(guard) = guard {
                self.validate_guard(guard, &scope)?;
            }
            self.validate_node(body, &mut scope)?;
        }
        Ok(())
    }

    fn validate_cond_clauses(&self, clauses: &[CondClause], env: &Env<'a>) -> EvalResult<()> {
        for CondClause { condition, body } in clauses {
            let mut scope = env.child();
            self.validate_node(condition, &mut scope)?;
            self.validate_node(body, &mut scope)?;
        }
        Ok(())
    }

    fn validate_call(
        &self,
        module: Option<&ModuleRef>,
        name: &str,
        arity: u32,
        line: u32,
    ) -> EvalResult<()> {
        match module {
            None => {
                if self.is_local_function(name, arity)
                    || self.whitelist.is_kernel_guard(name, arity)
                    || self.whitelist.is_kernel_function(name, arity)
                {
                    Ok(())
                } else {
                    Err(EvalError::ForbiddenFunction {
                        line,
                        target: format!("{name}/{arity}"),
                    })
                }
            }
            Some(module) => {
                if self
                    .whitelist
                    .allows_qualified_call(module.as_str(), name, arity)
                {
                    Ok(())
                } else {
                    Err(EvalError::ForbiddenFunction {
                        line,
                        target: format!("{}.{}", module.as_str(), name),
                    })
                }
            }
        }
    }
}

/// Flattens the bound-name subset of a list of parameter patterns, per
/// spec §4.4: "patterns more complex than bare identifiers are admitted as
/// parameters but only their bound-name subset is tracked for I4."
fn collect_bound_names(patterns: &[Node]) -> HashSet<String> {
    let mut names = HashSet::new();
    for pattern in patterns {
        names.extend(collect_bound_names_node(pattern));
    }
    names
}

fn collect_bound_names_node(node: &Node) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_bound_names_into(node, &mut names);
    names
}

fn collect_bound_names_into(node: &Node, names: &mut HashSet<String>) {
    match &node.kind {
        NodeKind::Ident(name) => {
            names.insert(name.clone());
        }
        NodeKind::Tuple(items) => {
            for item in items {
                collect_bound_names_into(item, names);
            }
        }
        NodeKind::ListCons { items, tail } => {
            for item in items {
                collect_bound_names_into(item, names);
            }
            if let Some(tail) = tail {
                collect_bound_names_into(tail, names);
            }
        }
        NodeKind::MapLiteral(entries) => {
            for (_, v) in entries {
                collect_bound_names_into(v, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{declared_functions, match_function, match_module_name};
    use crate::parser::parse;
    use crate::shape::validate_shape;

    fn validate_source(src: &str, function: &str, arity: u32) -> EvalResult<()> {
        let root = parse(src).unwrap();
        let shape = validate_shape(&root).unwrap();
        match_module_name(&shape, shape.name.join(".").as_str()).unwrap();
        let found = match_function(&shape, function, arity).unwrap();
        let local_defs = declared_functions(&shape);
        let whitelist = Whitelist::standard();
        let validator = Validator::new(&whitelist, &local_defs);
        validator.validate_function(found.params, found.guard, found.body)
    }

    #[test]
    fn admits_arithmetic_and_map_construction() {
        let src = "defmodule Calculator do\n  def add_tax(price) do\n    tax = price * 0.2\n    %{price: price, tax: tax, total: price + tax}\n  end\nend";
        assert!(validate_source(src, "add_tax", 1).is_ok());
    }

    #[test]
    fn rejects_parameter_reassignment() {
        let src = "defmodule M do\n  def increment(x) do\n    x = x + 1\n    x\n  end\nend";
        assert_eq!(
            validate_source(src, "increment", 1).unwrap_err(),
            EvalError::ParamReassignment {
                line: 3,
                name: "x".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_forbidden_qualified_call() {
        let src =
            "defmodule M do\n  def read_file(path) do\n    File.read!(path)\n  end\nend";
        assert_eq!(
            validate_source(src, "read_file", 1).unwrap_err(),
            EvalError::ForbiddenFunction {
                line: 3,
                target: "File.read!".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_qualified_call_in_guard() {
        let src = "defmodule M do\n  def f(x) when String.length(x) > 0 do\n    x\n  end\nend";
        assert_eq!(
            validate_source(src, "f", 1).unwrap_err(),
            EvalError::ForbiddenFunction {
                line: 2,
                target: "String.length".to_owned(),
            }
        );
    }

    #[test]
    fn admits_recursive_local_call() {
        let src = "defmodule M do\n  def fib(n) do\n    case n do\n      0 -> 0\n      1 -> 1\n      _ -> fib(n - 1) + fib(n - 2)\n    end\n  end\nend";
        assert!(validate_source(src, "fib", 1).is_ok());
    }
}
