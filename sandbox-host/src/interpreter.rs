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

//! Tree-walk evaluation of an admitted module. Everything here trusts its
//! input: the AST it walks has already passed stage V, so it makes no
//! attempt to re-check the whitelist — it only has to *execute* what V
//! already proved safe to run.

use std::collections::HashMap;

use sandbox_ast::{Clause, CondClause, Node, NodeKind, StringPart, Value, WithClause};

use crate::error::{HostError, HostResult};

pub type Env = HashMap<String, Value>;

/// One module's worth of `def`/`defp` heads, keyed by `(name, arity)` so
/// local and recursive calls resolve without re-scanning the statement
/// list on every call.
pub struct Interpreter<'a> {
    defs: HashMap<(&'a str, u32), &'a Node>,
}

impl<'a> Interpreter<'a> {
    pub fn new(module: &'a Node) -> HostResult<Self> {
        let NodeKind::Defmodule { body, .. } = &module.kind else {
            return Err(HostError::BadArgument("not a module".to_owned()));
        };
        let statements: &[Node] = match &body.kind {
            NodeKind::Block(stmts) => stmts.as_slice(),
            _ => std::slice::from_ref(body.as_ref()),
        };
        let mut defs = HashMap::new();
        for stmt in statements {
            if let NodeKind::Def { name, params, .. } = &stmt.kind {
                defs.insert((name.as_str(), params.len() as u32), stmt);
            }
        }
        Ok(Interpreter { defs })
    }

    pub fn invoke(&self, function_id: &str, args: &[Value]) -> HostResult<Value> {
        self.call_local(function_id, args)
    }

    fn call_local(&self, name: &str, args: &[Value]) -> HostResult<Value> {
        let def = self
            .defs
            .get(&(name, args.len() as u32))
            .ok_or_else(|| HostError::FunctionNotFound(format!("{name}/{}", args.len())))?;
        let NodeKind::Def { params, body, .. } = &def.kind else {
            unreachable!("defs map only ever holds Def nodes")
        };
        let mut env = Env::new();
        for (param, value) in params.iter().zip(args) {
            bind_pattern(param, value, &mut env);
        }
        self.eval(body, &mut env)
    }

    fn eval(&self, node: &Node, env: &mut Env) -> HostResult<Value> {
        match &node.kind {
            NodeKind::Int(n) => Ok(Value::Integer(*n)),
            NodeKind::Float(n) => Ok(Value::Float(*n)),
            NodeKind::Atom(a) => Ok(Value::Atom(a.clone())),
            NodeKind::Bool(b) => Ok(Value::Bool(*b)),
            NodeKind::Nil => Ok(Value::Nil),
            NodeKind::Bitstring(bytes) => Ok(Value::Bitstring(bytes.clone())),

            NodeKind::Str(parts) => self.eval_string(parts, env),

            NodeKind::Ident(name) => {
                if let Some(value) = env.get(name) {
                    return Ok(value.clone());
                }
                self.call_local(name, &[])
            }

            NodeKind::Match { pattern, value } => {
                let evaluated = self.eval(value, env)?;
                if bind_pattern(pattern, &evaluated, env) {
                    Ok(evaluated)
                } else {
                    Err(HostError::MatchError)
                }
            }

            NodeKind::Op { op, args } => self.eval_op(op, args, env),

            NodeKind::Pipe { lhs, rhs } => {
                let lhs_value = self.eval(lhs, env)?;
                match &rhs.kind {
                    NodeKind::Call { module, name, args } => {
                        let mut values = Vec::with_capacity(args.len() + 1);
                        values.push(lhs_value);
                        for arg in args {
                            values.push(self.eval(arg, env)?);
                        }
                        self.call_target(module.as_ref().map(|m| m.as_str()), name, values)
                    }
                    _ => Err(HostError::Unsupported("pipe target must be a call".to_owned())),
                }
            }

            NodeKind::Call { module, name, args } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<HostResult<Vec<_>>>()?;
                self.call_target(module.as_ref().map(|m| m.as_str()), name, values)
            }

            NodeKind::Capture { module, name, arity } => Ok(self.build_capture(
                module.as_ref().map(|m| m.as_str()),
                name,
                *arity,
            )),

            NodeKind::ListCons { items, tail } => {
                let mut values = items
                    .iter()
                    .map(|i| self.eval(i, env))
                    .collect::<HostResult<Vec<_>>>()?;
                if let Some(tail) = tail {
                    match self.eval(tail, env)? {
                        Value::List(rest) => values.extend(rest),
                        other => {
                            return Err(HostError::BadArgument(format!(
                                "list tail must be a list, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(Value::List(values))
            }

            NodeKind::Tuple(items) => Ok(Value::Tuple(
                items
                    .iter()
                    .map(|i| self.eval(i, env))
                    .collect::<HostResult<Vec<_>>>()?,
            )),

            NodeKind::MapLiteral(entries) => {
                let mut map = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    map.push((self.eval(k, env)?, self.eval(v, env)?));
                }
                Ok(Value::Map(map))
            }

            NodeKind::MapUpdate { base, entries } => {
                let Value::Map(mut map) = self.eval(base, env)? else {
                    return Err(HostError::BadArgument("map update target is not a map".to_owned()));
                };
                for (k, v) in entries {
                    let key = self.eval(k, env)?;
                    let value = self.eval(v, env)?;
                    if let Some(slot) = map.iter_mut().find(|(k, _)| *k == key) {
                        slot.1 = value;
                    } else {
                        map.push((key, value));
                    }
                }
                Ok(Value::Map(map))
            }

            NodeKind::Sigil { letter, content, .. } => Ok(eval_sigil(*letter, content)),

            NodeKind::Block(stmts) => {
                let mut result = Value::Nil;
                for stmt in stmts {
                    result = self.eval(stmt, env)?;
                }
                Ok(result)
            }

            NodeKind::Fn(clauses) => Ok(Value::Closure(Box::new(sandbox_ast::value::Closure {
                clauses: clauses.clone(),
                env: env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }))),

            NodeKind::Case { subject, clauses } => {
                let value = self.eval(subject, env)?;
                match self.eval_clauses(clauses, &value, env) {
                    Some(result) => result,
                    None => Err(HostError::NoMatchingClause),
                }
            }

            NodeKind::Cond(clauses) => self.eval_cond(clauses, env),

            NodeKind::With {
                clauses,
                body,
                else_clauses,
            } => self.eval_with(clauses, body, else_clauses, env),

            NodeKind::Attribute { .. } => Ok(Value::Nil),

            NodeKind::Def { .. }
            | NodeKind::Defmodule { .. }
            | NodeKind::Alias
            | NodeKind::Import
            | NodeKind::Require
            | NodeKind::Use => Err(HostError::Unsupported(node.kind.tag().to_owned())),
        }
    }

    fn eval_string(&self, parts: &[StringPart], env: &mut Env) -> HostResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                StringPart::Literal(s) => out.push_str(s),
                StringPart::Interpolated(expr) => {
                    out.push_str(&display_value(&self.eval(expr, env)?));
                }
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_op(&self, op: &str, args: &[Node], env: &mut Env) -> HostResult<Value> {
        match op {
            "&&" | "and" => {
                let lhs = self.eval(&args[0], env)?;
                if !lhs.is_truthy() {
                    return Ok(lhs);
                }
                self.eval(&args[1], env)
            }
            "||" | "or" => {
                let lhs = self.eval(&args[0], env)?;
                if lhs.is_truthy() {
                    return Ok(lhs);
                }
                self.eval(&args[1], env)
            }
            "not" => {
                let value = self.eval(&args[0], env)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
            _ => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<HostResult<Vec<_>>>()?;
                apply_operator(op, values)
            }
        }
    }

    fn eval_clauses(
        &self,
        clauses: &[Clause],
        subject: &Value,
        env: &Env,
    ) -> Option<HostResult<Value>> {
        'clauses: for Clause {
            patterns,
            guard,
            body,
        } in clauses
        {
            let mut scope = env.clone();
            if let [pattern] = patterns.as_slice() {
                if !bind_pattern(pattern, subject, &mut scope) {
                    continue 'clauses;
                }
            } else {
                continue 'clauses;
            }
            if let Some(guard) = guard {
                match self.eval(guard, &mut scope) {
                    Ok(v) if v.is_truthy() => {}
                    Ok(_) => continue 'clauses,
                    Err(e) => return Some(Err(e)),
                }
            }
            return Some(self.eval(body, &mut scope));
        }
        None
    }

    fn eval_cond(&self, clauses: &[CondClause], env: &mut Env) -> HostResult<Value> {
        for CondClause { condition, body } in clauses {
            let mut scope = env.clone();
            if self.eval(condition, &mut scope)?.is_truthy() {
                return self.eval(body, &mut scope);
            }
        }
        Err(HostError::NoMatchingCondClause)
    }

    fn eval_with(
        &self,
        clauses: &[WithClause],
        body: &Node,
        else_clauses: &[Clause],
        env: &mut Env,
    ) -> HostResult<Value> {
        let mut scope = env.clone();
        for WithClause { pattern, expr } in clauses {
            let value = self.eval(expr, &mut scope)?;
            if !bind_pattern(pattern, &value, &mut scope) {
                if else_clauses.is_empty() {
                    return Err(HostError::NoMatchingWithClause);
                }
                return self
                    .eval_clauses(else_clauses, &value, env)
                    .unwrap_or(Err(HostError::NoMatchingWithClause));
            }
        }
        self.eval(body, &mut scope)
    }

    fn call_target(
        &self,
        module: Option<&str>,
        name: &str,
        args: Vec<Value>,
    ) -> HostResult<Value> {
        match module {
            None | Some("Kernel") => {
                if self.defs.contains_key(&(name, args.len() as u32)) {
                    self.call_local(name, &args)
                } else {
                    crate::builtins::call_kernel(name, &args)
                }
            }
            Some(other) => crate::builtins::call_qualified(self, other, name, args),
        }
    }

    fn build_capture(&self, module: Option<&str>, name: &str, arity: u32) -> Value {
        let params: Vec<Node> = (0..arity)
            .map(|i| Node::new(0, NodeKind::Ident(format!("_cap{i}"))))
            .collect();
        let call_args: Vec<Node> = (0..arity)
            .map(|i| Node::new(0, NodeKind::Ident(format!("_cap{i}"))))
            .collect();
        let body = Node::new(
            0,
            NodeKind::Call {
                module: module.map(|m| sandbox_ast::ModuleRef(m.to_owned())),
                name: name.to_owned(),
                args: call_args,
            },
        );
        Value::Closure(Box::new(sandbox_ast::value::Closure {
            clauses: vec![Clause {
                patterns: params,
                guard: None,
                body: Box::new(body),
            }],
            env: Vec::new(),
        }))
    }

    /// Applies a closure value to `args`, used by `Enum.map/2` and friends.
    pub fn call_closure(&self, closure: &sandbox_ast::value::Closure, args: &[Value]) -> HostResult<Value> {
        for Clause {
            patterns,
            guard,
            body,
        } in &closure.clauses
        {
            if patterns.len() != args.len() {
                continue;
            }
            let mut scope: Env = closure.env.iter().cloned().collect();
            let mut matched = true;
            for (pattern, value) in patterns.iter().zip(args) {
                if !bind_pattern(pattern, value, &mut scope) {
                    matched = false;
                    break;
                }
            }
            if !matched {
                continue;
            }
            if let Some(guard) = guard {
                match self.eval(guard, &mut scope) {
                    Ok(v) if v.is_truthy() => {}
                    _ => continue,
                }
            }
            return self.eval(body, &mut scope);
        }
        Err(HostError::NoMatchingClause)
    }
}

/// Attempts to bind `pattern` against `value`, inserting any new names into
/// `env`. Returns `false` on a structural mismatch without partially
/// committing bindings from the failed branch (callers always operate on a
/// scratch clone of the environment, never the live one, for this reason).
pub fn bind_pattern(pattern: &Node, value: &Value, env: &mut Env) -> bool {
    match &pattern.kind {
        NodeKind::Ident(name) => {
            env.insert(name.clone(), value.clone());
            true
        }
        NodeKind::Int(n) => matches!(value, Value::Integer(v) if v == n),
        NodeKind::Float(n) => matches!(value, Value::Float(v) if v == n),
        NodeKind::Atom(a) => matches!(value, Value::Atom(v) if v == a),
        NodeKind::Bool(b) => matches!(value, Value::Bool(v) if v == b),
        NodeKind::Nil => matches!(value, Value::Nil),
        NodeKind::Bitstring(bytes) => matches!(value, Value::Bitstring(v) if v == bytes),
        NodeKind::Str(parts) => match (parts.as_slice(), value) {
            ([StringPart::Literal(s)], Value::Str(v)) => s == v,
            ([], Value::Str(v)) => v.is_empty(),
            _ => false,
        },
        NodeKind::Tuple(items) => match value {
            Value::Tuple(values) if values.len() == items.len() => items
                .iter()
                .zip(values)
                .all(|(p, v)| bind_pattern(p, v, env)),
            _ => false,
        },
        NodeKind::ListCons { items, tail } => match value {
            Value::List(values) => {
                if tail.is_none() {
                    if values.len() != items.len() {
                        return false;
                    }
                } else if values.len() < items.len() {
                    return false;
                }
                for (p, v) in items.iter().zip(values.iter()) {
                    if !bind_pattern(p, v, env) {
                        return false;
                    }
                }
                if let Some(tail_pattern) = tail {
                    let rest = Value::List(values[items.len()..].to_vec());
                    bind_pattern(tail_pattern, &rest, env)
                } else {
                    true
                }
            }
            _ => false,
        },
        NodeKind::MapLiteral(entries) => match value {
            Value::Map(_) => entries.iter().all(|(key_node, value_pattern)| {
                let key = match &key_node.kind {
                    NodeKind::Atom(a) => Value::Atom(a.clone()),
                    NodeKind::Int(n) => Value::Integer(*n),
                    NodeKind::Str(parts) if parts.len() == 1 => match &parts[0] {
                        StringPart::Literal(s) => Value::Str(s.clone()),
                        _ => return false,
                    },
                    _ => return false,
                };
                match value.map_get(&key) {
                    Some(found) => bind_pattern(value_pattern, found, env),
                    None => false,
                }
            }),
            _ => false,
        },
        _ => false,
    }
}

fn eval_sigil(letter: char, content: &str) -> Value {
    match letter {
        'c' | 'C' => Value::List(content.chars().map(|c| Value::Integer(c as i64)).collect()),
        'w' => Value::List(
            content
                .split_whitespace()
                .map(|w| Value::Str(w.to_owned()))
                .collect(),
        ),
        _ => Value::Str(content.to_owned()),
    }
}

/// `to_string`/`<>` render atoms without their leading `:` and everything
/// else the same as [`Value`]'s `Display`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Atom(a) => a.clone(),
        other => other.to_string(),
    }
}

fn numeric(value: &Value) -> HostResult<f64> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(HostError::BadArgument(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
    }
}

fn both_integers(a: &Value, b: &Value) -> Option<(i64, i64)> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some((*x, *y)),
        _ => None,
    }
}

pub fn apply_operator(op: &str, mut args: Vec<Value>) -> HostResult<Value> {
    if args.len() == 1 && op == "-" {
        return match args.remove(0) {
            Value::Integer(n) => Ok(Value::Integer(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(HostError::BadArgument(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        };
    }

    let a = args.first().cloned().ok_or_else(|| {
        HostError::Unsupported(format!("operator {op} requires at least one operand"))
    })?;
    let b = args.get(1).cloned();

    match op {
        "+" | "-" | "*" => {
            let b = b.ok_or_else(|| HostError::Unsupported(format!("operator {op} requires two operands")))?;
            if let Some((x, y)) = both_integers(&a, &b) {
                return Ok(Value::Integer(match op {
                    "+" => x + y,
                    "-" => x - y,
                    "*" => x * y,
                    _ => unreachable!(),
                }));
            }
            let (x, y) = (numeric(&a)?, numeric(&b)?);
            Ok(Value::Float(match op {
                "+" => x + y,
                "-" => x - y,
                "*" => x * y,
                _ => unreachable!(),
            }))
        }
        "/" => {
            let b = b.ok_or_else(|| HostError::Unsupported("operator / requires two operands".to_owned()))?;
            let (x, y) = (numeric(&a)?, numeric(&b)?);
            if y == 0.0 {
                return Err(HostError::DivisionByZero);
            }
            Ok(Value::Float(x / y))
        }
        "==" | "===" => Ok(Value::Bool(a == b.unwrap_or(Value::Nil))),
        "!=" | "!==" => Ok(Value::Bool(a != b.unwrap_or(Value::Nil))),
        ">" | ">=" | "<" | "<=" => {
            let b = b.ok_or_else(|| HostError::Unsupported(format!("operator {op} requires two operands")))?;
            let (x, y) = (numeric(&a)?, numeric(&b)?);
            Ok(Value::Bool(match op {
                ">" => x > y,
                ">=" => x >= y,
                "<" => x < y,
                "<=" => x <= y,
                _ => unreachable!(),
            }))
        }
        "<>" => {
            let b = b.ok_or_else(|| HostError::Unsupported("operator <> requires two operands".to_owned()))?;
            Ok(Value::Str(format!("{}{}", display_value(&a), display_value(&b))))
        }
        "++" => {
            let b = b.ok_or_else(|| HostError::Unsupported("operator ++ requires two operands".to_owned()))?;
            match (a, b) {
                (Value::List(mut x), Value::List(y)) => {
                    x.extend(y);
                    Ok(Value::List(x))
                }
                _ => Err(HostError::BadArgument("++ requires two lists".to_owned())),
            }
        }
        other => Err(HostError::Unsupported(format!("operator {other}"))),
    }
}
