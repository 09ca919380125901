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

//! Implementations of the kernel functions/guards and the handful of
//! qualified-module functions (`String.*`, `Map.*`, `Enum.*`, …) this
//! host chooses to support. The whitelist admits whole modules
//! (`all_functions` for `Map`/`Enum`/`Kernel`) statically; this file is
//! deliberately a subset of what V would let through — anything not
//! implemented here surfaces as an ordinary runtime exception
//! (`Unsupported`), exactly like a host missing a built-in would in the
//! original runtime (spec §1: the concrete host runtime is an external
//! collaborator, not something this specification fully pins down).

use sandbox_ast::Value;

use crate::error::{HostError, HostResult};
use crate::interpreter::{display_value, Interpreter};

pub fn call_kernel(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("abs", [Value::Integer(n)]) => Ok(Value::Integer(n.abs())),
        ("abs", [Value::Float(n)]) => Ok(Value::Float(n.abs())),
        ("to_string", [v]) => Ok(Value::Str(display_value(v))),
        ("length", [Value::List(items)]) => Ok(Value::Integer(items.len() as i64)),
        ("hd", [Value::List(items)]) => items
            .first()
            .cloned()
            .ok_or_else(|| HostError::BadArgument("hd/1 called on empty list".to_owned())),
        ("tl", [Value::List(items)]) => {
            if items.is_empty() {
                return Err(HostError::BadArgument("tl/1 called on empty list".to_owned()));
            }
            Ok(Value::List(items[1..].to_vec()))
        }
        ("elem", [Value::Tuple(items), Value::Integer(i)]) => items
            .get(*i as usize)
            .cloned()
            .ok_or_else(|| HostError::BadArgument("elem/2 index out of range".to_owned())),
        ("tuple_size", [Value::Tuple(items)]) => Ok(Value::Integer(items.len() as i64)),
        ("map_size", [Value::Map(entries)]) => Ok(Value::Integer(entries.len() as i64)),
        ("round", [Value::Float(n)]) => Ok(Value::Integer(n.round() as i64)),
        ("round", [Value::Integer(n)]) => Ok(Value::Integer(*n)),
        ("trunc", [Value::Float(n)]) => Ok(Value::Integer(n.trunc() as i64)),
        ("trunc", [Value::Integer(n)]) => Ok(Value::Integer(*n)),
        ("floor", [Value::Float(n)]) => Ok(Value::Integer(n.floor() as i64)),
        ("floor", [Value::Integer(n)]) => Ok(Value::Integer(*n)),
        ("ceil", [Value::Float(n)]) => Ok(Value::Integer(n.ceil() as i64)),
        ("ceil", [Value::Integer(n)]) => Ok(Value::Integer(*n)),
        ("max", [a, b]) => Ok(if numeric_gte(a, b)? { a.clone() } else { b.clone() }),
        ("min", [a, b]) => Ok(if numeric_gte(a, b)? { b.clone() } else { a.clone() }),
        ("div", [Value::Integer(a), Value::Integer(b)]) => {
            if *b == 0 {
                return Err(HostError::DivisionByZero);
            }
            Ok(Value::Integer(a.div_euclid(*b)))
        }
        ("rem", [Value::Integer(a), Value::Integer(b)]) => {
            if *b == 0 {
                return Err(HostError::DivisionByZero);
            }
            Ok(Value::Integer(a.rem_euclid(*b)))
        }
        ("is_atom", [v]) => Ok(Value::Bool(matches!(v, Value::Atom(_)))),
        ("is_binary", [v]) => Ok(Value::Bool(matches!(v, Value::Str(_) | Value::Bitstring(_)))),
        ("is_boolean", [v]) => Ok(Value::Bool(matches!(v, Value::Bool(_)))),
        ("is_float", [v]) => Ok(Value::Bool(matches!(v, Value::Float(_)))),
        ("is_integer", [v]) => Ok(Value::Bool(matches!(v, Value::Integer(_)))),
        ("is_list", [v]) => Ok(Value::Bool(matches!(v, Value::List(_)))),
        ("is_map", [v]) => Ok(Value::Bool(matches!(v, Value::Map(_)))),
        ("is_nil", [v]) => Ok(Value::Bool(matches!(v, Value::Nil))),
        ("is_number", [v]) => Ok(Value::Bool(matches!(v, Value::Integer(_) | Value::Float(_)))),
        ("is_tuple", [v]) => Ok(Value::Bool(matches!(v, Value::Tuple(_)))),
        ("is_function", [v]) => Ok(Value::Bool(matches!(v, Value::Closure(_)))),
        ("is_function", [v, Value::Integer(arity)]) => Ok(Value::Bool(matches!(
            v,
            Value::Closure(c) if c.clauses.first().is_some_and(|cl| cl.patterns.len() as i64 == *arity)
        ))),
        _ => Err(HostError::Unsupported(format!("Kernel.{name}/{}", args.len()))),
    }
}

fn numeric_gte(a: &Value, b: &Value) -> HostResult<bool> {
    let to_f64 = |v: &Value| match v {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(HostError::BadArgument(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
    };
    Ok(to_f64(a)? >= to_f64(b)?)
}

pub fn call_qualified(
    interp: &Interpreter<'_>,
    module: &str,
    name: &str,
    args: Vec<Value>,
) -> HostResult<Value> {
    match module {
        "String" => string_builtin(name, &args),
        "Map" | "Access" => map_builtin(name, &args),
        "Enum" => enum_builtin(interp, name, args),
        "Integer" => integer_builtin(name, &args),
        "Float" => float_builtin(name, &args),
        "List" => list_builtin(name, &args),
        "Kernel" => call_kernel(name, &args),
        other => Err(HostError::Unsupported(format!("{other}.{name}/{}", args.len()))),
    }
}

fn string_builtin(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("upcase", [Value::Str(s)]) => Ok(Value::Str(s.to_uppercase())),
        ("downcase", [Value::Str(s)]) => Ok(Value::Str(s.to_lowercase())),
        ("trim", [Value::Str(s)]) => Ok(Value::Str(s.trim().to_owned())),
        ("length", [Value::Str(s)]) => Ok(Value::Integer(s.chars().count() as i64)),
        ("reverse", [Value::Str(s)]) => Ok(Value::Str(s.chars().rev().collect())),
        ("split", [Value::Str(s)]) => Ok(Value::List(
            s.split_whitespace().map(|p| Value::Str(p.to_owned())).collect(),
        )),
        ("split", [Value::Str(s), Value::Str(sep)]) => Ok(Value::List(
            s.split(sep.as_str()).map(|p| Value::Str(p.to_owned())).collect(),
        )),
        ("contains?", [Value::Str(s), Value::Str(needle)]) => Ok(Value::Bool(s.contains(needle.as_str()))),
        ("starts_with?", [Value::Str(s), Value::Str(prefix)]) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
        ("ends_with?", [Value::Str(s), Value::Str(suffix)]) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
        ("replace", [Value::Str(s), Value::Str(from), Value::Str(to)]) => {
            Ok(Value::Str(s.replace(from.as_str(), to.as_str())))
        }
        _ => Err(HostError::Unsupported(format!("String.{name}/{}", args.len()))),
    }
}

fn map_builtin(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("new", []) => Ok(Value::Map(Vec::new())),
        ("get", [Value::Map(_), key]) => Ok(args[0].map_get(key).cloned().unwrap_or(Value::Nil)),
        ("get", [Value::Map(_), key, default]) => {
            Ok(args[0].map_get(key).cloned().unwrap_or_else(|| default.clone()))
        }
        ("fetch", [Value::Map(_), key]) => match args[0].map_get(key) {
            Some(v) => Ok(Value::Tuple(vec![Value::atom("ok"), v.clone()])),
            None => Ok(Value::atom("error")),
        },
        ("put", [Value::Map(entries), key, value]) => {
            let mut entries = entries.clone();
            if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
                slot.1 = value.clone();
            } else {
                entries.push((key.clone(), value.clone()));
            }
            Ok(Value::Map(entries))
        }
        ("delete", [Value::Map(entries), key]) => {
            Ok(Value::Map(entries.iter().filter(|(k, _)| k != key).cloned().collect()))
        }
        ("has_key?", [Value::Map(_), key]) => Ok(Value::Bool(args[0].map_get(key).is_some())),
        ("keys", [Value::Map(entries)]) => Ok(Value::List(entries.iter().map(|(k, _)| k.clone()).collect())),
        ("values", [Value::Map(entries)]) => Ok(Value::List(entries.iter().map(|(_, v)| v.clone()).collect())),
        ("merge", [Value::Map(a), Value::Map(b)]) => {
            let mut merged = a.clone();
            for (k, v) in b {
                if let Some(slot) = merged.iter_mut().find(|(mk, _)| mk == k) {
                    slot.1 = v.clone();
                } else {
                    merged.push((k.clone(), v.clone()));
                }
            }
            Ok(Value::Map(merged))
        }
        _ => Err(HostError::Unsupported(format!("Map.{name}/{}", args.len()))),
    }
}

fn enum_builtin(interp: &Interpreter<'_>, name: &str, args: Vec<Value>) -> HostResult<Value> {
    match (name, args.as_slice()) {
        ("count", [Value::List(items)]) => Ok(Value::Integer(items.len() as i64)),
        ("reverse", [Value::List(items)]) => Ok(Value::List(items.iter().rev().cloned().collect())),
        ("sum", [Value::List(items)]) => {
            let mut total = 0f64;
            let mut all_int = true;
            for item in items {
                match item {
                    Value::Integer(n) => total += *n as f64,
                    Value::Float(n) => {
                        all_int = false;
                        total += n;
                    }
                    other => {
                        return Err(HostError::BadArgument(format!(
                            "Enum.sum/1 expects numbers, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(if all_int {
                Value::Integer(total as i64)
            } else {
                Value::Float(total)
            })
        }
        ("at", [Value::List(items), Value::Integer(i)]) => {
            Ok(items.get(*i as usize).cloned().unwrap_or(Value::Nil))
        }
        ("to_list", [v @ Value::List(_)]) => Ok(v.clone()),
        ("join", [Value::List(items), Value::Str(sep)]) => Ok(Value::Str(
            items
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(sep),
        )),
        ("map", [Value::List(items), Value::Closure(closure)]) => {
            let mapped = items
                .iter()
                .map(|item| interp.call_closure(closure, std::slice::from_ref(item)))
                .collect::<HostResult<Vec<_>>>()?;
            Ok(Value::List(mapped))
        }
        ("filter", [Value::List(items), Value::Closure(closure)]) => {
            let mut kept = Vec::new();
            for item in items {
                if interp
                    .call_closure(closure, std::slice::from_ref(item))?
                    .is_truthy()
                {
                    kept.push(item.clone());
                }
            }
            Ok(Value::List(kept))
        }
        ("reduce", [Value::List(items), init, Value::Closure(closure)]) => {
            let mut acc = init.clone();
            for item in items {
                acc = interp.call_closure(closure, &[item.clone(), acc])?;
            }
            Ok(acc)
        }
        _ => Err(HostError::Unsupported(format!("Enum.{name}/{}", args.len()))),
    }
}

fn integer_builtin(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("to_string", [Value::Integer(n)]) => Ok(Value::Str(n.to_string())),
        ("parse", [Value::Str(s)]) => match s.trim().parse::<i64>() {
            Ok(n) => Ok(Value::Tuple(vec![Value::Integer(n), Value::Str(String::new())])),
            Err(_) => Ok(Value::atom("error")),
        },
        ("is_even", [Value::Integer(n)]) => Ok(Value::Bool(n % 2 == 0)),
        ("is_odd", [Value::Integer(n)]) => Ok(Value::Bool(n % 2 != 0)),
        _ => Err(HostError::Unsupported(format!("Integer.{name}/{}", args.len()))),
    }
}

fn float_builtin(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("round", [Value::Float(n)]) => Ok(Value::Integer(n.round() as i64)),
        ("round", [Value::Float(n), Value::Integer(precision)]) => {
            let factor = 10f64.powi(*precision as i32);
            Ok(Value::Float((n * factor).round() / factor))
        }
        ("to_string", [Value::Float(n)]) => Ok(Value::Str(n.to_string())),
        _ => Err(HostError::Unsupported(format!("Float.{name}/{}", args.len()))),
    }
}

fn list_builtin(name: &str, args: &[Value]) -> HostResult<Value> {
    match (name, args) {
        ("first", [Value::List(items)]) => Ok(items.first().cloned().unwrap_or(Value::Nil)),
        ("last", [Value::List(items)]) => Ok(items.last().cloned().unwrap_or(Value::Nil)),
        ("flatten", [Value::List(items)]) => Ok(Value::List(flatten(items))),
        ("to_tuple", [Value::List(items)]) => Ok(Value::Tuple(items.clone())),
        _ => Err(HostError::Unsupported(format!("List.{name}/{}", args.len()))),
    }
}

fn flatten(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::List(inner) => out.extend(flatten(inner)),
            other => out.push(other.clone()),
        }
    }
    out
}
