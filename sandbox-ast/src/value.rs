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

//! Runtime values passed into and returned out of `eval`.

use crate::ast::Clause;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// A closure captures its formal parameters, body, and the lexical
/// environment in effect when the `fn` literal was evaluated.
#[derive(Debug, Clone)]
pub struct Closure {
    pub clauses: Vec<Clause>,
    pub env: Vec<(String, Value)>,
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        // Closures are only ever compared by identity-like structural
        // equality in tests; two closures with the same clauses and
        // captured bindings are equal.
        self.clauses == other.clauses && self.env == other.env
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    Atom(String),
    Bool(bool),
    Nil,
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Small association list rather than a hash map: sandboxed programs
    /// never hold enough entries for this to matter, and it keeps `Value`
    /// usable as a map key without requiring `Hash`/`Eq` on floats.
    Map(Vec<(Value, Value)>),
    Bitstring(Vec<u8>),
    Closure(Box<Closure>),
}

// `Value::Closure` has no meaningful wire representation (it closes over
// live AST and an environment), so `serde` support is a hand-written
// `Serialize` impl that renders closures as an opaque marker rather than a
// derive, which would need `Closure: Deserialize + Default`.
#[cfg(feature = "serde")]
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Atom(a) => serializer.serialize_str(&format!(":{a}")),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Nil => serializer.serialize_none(),
            Value::List(items) => items.serialize(serializer),
            Value::Tuple(items) => items.serialize(serializer),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
            Value::Bitstring(bytes) => bytes.serialize(serializer),
            Value::Closure(_) => serializer.serialize_str("#Function<sandbox>"),
        }
    }
}

impl Value {
    pub fn atom(s: impl Into<String>) -> Self {
        Value::Atom(s.into())
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "binary",
            Value::Atom(_) => "atom",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Bitstring(_) => "bitstring",
            Value::Closure(_) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Atom(a) => write!(f, ":{a}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "nil"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Map(entries) => {
                write!(f, "%{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                write!(f, "}}")
            }
            Value::Bitstring(bytes) => write!(f, "<<{} bytes>>", bytes.len()),
            Value::Closure(_) => write!(f, "#Function<sandbox>"),
        }
    }
}

/// Convenience conversions used heavily by the builtin host and by tests.
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}
