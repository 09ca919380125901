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

//! Internal, structured error type. Every stage returns `EvalError`;
//! `Sandbox::eval` flattens it to `String` at the public boundary (spec §7,
//! §9 design note on "richer `Err(kind, message, line?)`, flatten at the
//! boundary").

use sandbox_ast::Line;

/// Coarse classification of an [`EvalError`], useful for structured
/// testing without parsing the rendered message back apart. Not part of
/// the public `eval` contract, which is a flat `String` (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum ErrorKind {
    Precheck,
    Structural,
    Whitelist,
    Runtime,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EvalError {
    #[error("Code size exceeds maximum limit")]
    SourceTooLarge,

    #[error("Suspicious code patterns detected")]
    SuspiciousPatterns,

    #[error("Potential atom exhaustion attack detected")]
    AtomExhaustion,

    #[error("Line {line}: {message}")]
    Parse { line: Line, message: String },

    #[error("Module name mismatch. Expected {expected}, got {actual}")]
    ModuleNameMismatch { expected: String, actual: String },

    #[error("Function {name}/{arity} not found")]
    FunctionNotFound { name: String, arity: u32 },

    #[error("Line {line}: Nested modules are not allowed")]
    NestedModule { line: Line },

    #[error("Line {line}: Module aliases are not allowed")]
    AliasNotAllowed { line: Line },

    #[error("Line {line}: Module imports are not allowed")]
    ImportNotAllowed { line: Line },

    #[error("Line {line}: Module requires are not allowed")]
    RequireNotAllowed { line: Line },

    #[error("Line {line}: Module use is not allowed")]
    UseNotAllowed { line: Line },

    #[error("Line {line}: Immediate code execution in modules is not allowed")]
    TopLevelExpression { line: Line },

    #[error("Line {line}: defmodule/def inside function body is not allowed")]
    NestedDefinition { line: Line },

    #[error("Line {line}: Forbidden function: {target}")]
    ForbiddenFunction { line: Line, target: String },

    #[error("Line {line}: Cannot assign to function parameter {name}")]
    ParamReassignment { line: Line, name: String },

    #[error("Line {line}: Forbidden expression")]
    ForbiddenExpression { line: Line },

    #[error("{0}")]
    Runtime(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::SourceTooLarge
            | EvalError::SuspiciousPatterns
            | EvalError::AtomExhaustion => ErrorKind::Precheck,
            EvalError::Parse { .. }
            | EvalError::ModuleNameMismatch { .. }
            | EvalError::FunctionNotFound { .. }
            | EvalError::NestedModule { .. }
            | EvalError::AliasNotAllowed { .. }
            | EvalError::ImportNotAllowed { .. }
            | EvalError::RequireNotAllowed { .. }
            | EvalError::UseNotAllowed { .. }
            | EvalError::TopLevelExpression { .. } => ErrorKind::Structural,
            EvalError::NestedDefinition { .. }
            | EvalError::ForbiddenFunction { .. }
            | EvalError::ParamReassignment { .. }
            | EvalError::ForbiddenExpression { .. } => ErrorKind::Whitelist,
            EvalError::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
