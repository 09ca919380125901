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

//! Runtime-stage failures (spec §7 kind 4: "exceptions raised while
//! executing admitted code"). These never escape the crate as anything but
//! a `String`, via the [`Host`](sandbox_eval::Host) trait's `Result<_,
//! String>`, matching the public contract's single `Err(String)`.

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("module not installed")]
    ModuleNotInstalled,

    #[error("Function {0} not found")]
    FunctionNotFound(String),

    #[error("no case clause matching")]
    NoMatchingClause,

    #[error("no cond clause evaluated to true")]
    NoMatchingCondClause,

    #[error("with clause did not match and no else was provided")]
    NoMatchingWithClause,

    #[error("match error")]
    MatchError,

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("unsupported host builtin: {0}")]
    Unsupported(String),

    #[error("division by zero")]
    DivisionByZero,
}

pub type HostResult<T> = Result<T, HostError>;
