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

//! The tagged AST produced by the parser.
//!
//! Every node carries a line number (`0` if unknown) so that validator
//! errors can be line-tagged. The set of `NodeKind` variants is closed and
//! known: forms outside this set simply cannot be represented, which is
//! what lets the whitelist validator treat "unclassified" as a single
//! catch-all rejection case.

use crate::Line;

/// A single AST node: a form tag plus line metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub line: Line,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(line: Line, kind: NodeKind) -> Self {
        Node { line, kind }
    }
}

/// A reference to a qualified module name in a call or capture, e.g. the
/// `String` in `String.upcase(x)`. Segments are joined with `.` so that
/// `Foo.Bar.baz()` resolves against the whitelist under the key
/// `"Foo.Bar"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef(pub String);

impl ModuleRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One piece of a (possibly interpolated) string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Interpolated(Box<Node>),
}

/// A `->` clause, used by `case`, `fn`, and the guarded arms of `cond`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub patterns: Vec<Node>,
    pub guard: Option<Box<Node>>,
    pub body: Box<Node>,
}

/// One `condition -> body` arm of a `cond` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CondClause {
    pub condition: Box<Node>,
    pub body: Box<Node>,
}

/// One `pattern <- expr` generator of a `with` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub pattern: Box<Node>,
    pub expr: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // --- literals ---
    Int(i64),
    Float(f64),
    Str(Vec<StringPart>),
    Atom(String),
    Bool(bool),
    Nil,
    Bitstring(Vec<u8>),

    // --- identifiers and bindings ---
    Ident(String),
    Match {
        pattern: Box<Node>,
        value: Box<Node>,
    },

    // --- operators, calls, pipes, captures ---
    Op {
        op: String,
        args: Vec<Node>,
    },
    Call {
        module: Option<ModuleRef>,
        name: String,
        args: Vec<Node>,
    },
    Capture {
        module: Option<ModuleRef>,
        name: String,
        arity: u32,
    },
    Pipe {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },

    // --- structural literals ---
    ListCons {
        items: Vec<Node>,
        tail: Option<Box<Node>>,
    },
    Tuple(Vec<Node>),
    MapLiteral(Vec<(Node, Node)>),
    MapUpdate {
        base: Box<Node>,
        entries: Vec<(Node, Node)>,
    },
    Sigil {
        letter: char,
        content: String,
        modifiers: String,
    },

    // --- control / structural forms ---
    Block(Vec<Node>),
    Fn(Vec<Clause>),
    Case {
        subject: Box<Node>,
        clauses: Vec<Clause>,
    },
    Cond(Vec<CondClause>),
    With {
        clauses: Vec<WithClause>,
        body: Box<Node>,
        else_clauses: Vec<Clause>,
    },

    // --- module-shape forms (rejected or consumed by stage S/N, never by V) ---
    Attribute {
        name: String,
        value: Box<Node>,
    },
    Def {
        name: String,
        params: Vec<Node>,
        guard: Option<Box<Node>>,
        body: Box<Node>,
        private: bool,
    },
    Defmodule {
        name: Vec<String>,
        body: Box<Node>,
    },
    Alias,
    Import,
    Require,
    Use,
}

impl NodeKind {
    /// A short, stable tag used in diagnostics and tests; not user facing on
    /// its own, but useful for asserting "the validator classified this node
    /// as X" without matching on the full enum.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Int(_) => "int",
            NodeKind::Float(_) => "float",
            NodeKind::Str(_) => "string",
            NodeKind::Atom(_) => "atom",
            NodeKind::Bool(_) => "bool",
            NodeKind::Nil => "nil",
            NodeKind::Bitstring(_) => "bitstring",
            NodeKind::Ident(_) => "identifier",
            NodeKind::Match { .. } => "match",
            NodeKind::Op { .. } => "operator",
            NodeKind::Call { .. } => "call",
            NodeKind::Capture { .. } => "capture",
            NodeKind::Pipe { .. } => "pipe",
            NodeKind::ListCons { .. } => "list",
            NodeKind::Tuple(_) => "tuple",
            NodeKind::MapLiteral(_) => "map",
            NodeKind::MapUpdate { .. } => "map_update",
            NodeKind::Sigil { .. } => "sigil",
            NodeKind::Block(_) => "block",
            NodeKind::Fn(_) => "fn",
            NodeKind::Case { .. } => "case",
            NodeKind::Cond(_) => "cond",
            NodeKind::With { .. } => "with",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Def { .. } => "def",
            NodeKind::Defmodule { .. } => "defmodule",
            NodeKind::Alias => "alias",
            NodeKind::Import => "import",
            NodeKind::Require => "require",
            NodeKind::Use => "use",
        }
    }
}
