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

//! Shared data model for the sandboxed evaluator: the AST produced by the
//! parser, the runtime `Value` type produced by evaluation, and the
//! whitelist table types consulted by the validator. This crate has no
//! parsing or evaluation logic of its own.

pub mod ast;
pub mod value;
pub mod whitelist;

pub use ast::{Clause, CondClause, ModuleRef, Node, NodeKind, StringPart, WithClause};
pub use value::Value;
pub use whitelist::{ModulePolicy, Whitelist};

/// 1-based source line number. Line `0` means "no line information available".
pub type Line = u32;
