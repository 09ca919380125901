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

//! The process-wide whitelist tables consulted by the validator (spec §3,
//! "Whitelist tables"). Everything here is read-only once constructed; no
//! stage downstream of the validator is allowed to mutate it.

use std::collections::{HashMap, HashSet};

/// Admission policy for a single qualified module, e.g. `String` or `Map`.
#[derive(Debug, Clone)]
pub enum ModulePolicy {
    /// Every `f/arity` pair on the module is admitted.
    AllFunctions,
    /// Only the listed `f/arity` pairs are admitted.
    Allowlist(HashSet<(String, u32)>),
    /// Every `f/arity` pair is admitted except the listed ones.
    Denylist(HashSet<(String, u32)>),
    /// Exactly one `f/arity` pair is admitted.
    Single(String, u32),
}

impl ModulePolicy {
    pub fn allows(&self, function: &str, arity: u32) -> bool {
        match self {
            ModulePolicy::AllFunctions => true,
            ModulePolicy::Allowlist(set) => set.contains(&(function.to_owned(), arity)),
            ModulePolicy::Denylist(set) => !set.contains(&(function.to_owned(), arity)),
            ModulePolicy::Single(name, arity2) => function == name && arity == *arity2,
        }
    }
}

/// The full set of whitelist tables, built once and shared read-only by
/// every `Sandbox::eval` call.
#[derive(Debug, Clone)]
pub struct Whitelist {
    pub operators: HashSet<String>,
    pub kernel_guards: HashSet<(String, u32)>,
    pub kernel_functions: HashSet<(String, u32)>,
    pub sigils: HashSet<char>,
    pub modules: HashMap<String, ModulePolicy>,
}

impl Whitelist {
    pub fn is_operator(&self, op: &str) -> bool {
        self.operators.contains(op)
    }

    pub fn is_kernel_guard(&self, name: &str, arity: u32) -> bool {
        self.kernel_guards.contains(&(name.to_owned(), arity))
    }

    pub fn is_kernel_function(&self, name: &str, arity: u32) -> bool {
        self.kernel_functions.contains(&(name.to_owned(), arity))
    }

    pub fn is_sigil(&self, letter: char) -> bool {
        self.sigils.contains(&letter)
    }

    pub fn module_policy(&self, module: &str) -> Option<&ModulePolicy> {
        self.modules.get(module)
    }

    pub fn allows_qualified_call(&self, module: &str, function: &str, arity: u32) -> bool {
        self.module_policy(module)
            .is_some_and(|policy| policy.allows(function, arity))
    }

    /// The default table, reproducing spec §3's example rows and the
    /// operator/guard/sigil sets named in §3–§4.5.
    pub fn standard() -> Self {
        let operators = [
            "+", "-", "*", "/", "==", "!=", "===", "!==", ">", ">=", "<", "<=", "&&", "||", "and",
            "or", "not", "<>", "++", "|>", "|", ".", "{}", "<<>>", "::", "when", "->", "fn",
            "__block__",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let kernel_guards = [
            ("is_atom", 1),
            ("is_binary", 1),
            ("is_boolean", 1),
            ("is_float", 1),
            ("is_integer", 1),
            ("is_list", 1),
            ("is_map", 1),
            ("is_nil", 1),
            ("is_number", 1),
            ("is_tuple", 1),
            ("is_function", 1),
            ("is_function", 2),
        ]
        .into_iter()
        .map(|(n, a)| (n.to_owned(), a))
        .collect();

        let kernel_functions = [
            ("abs", 1),
            ("to_string", 1),
            ("length", 1),
            ("hd", 1),
            ("tl", 1),
            ("elem", 2),
            ("tuple_size", 1),
            ("map_size", 1),
            ("round", 1),
            ("trunc", 1),
            ("max", 2),
            ("min", 2),
            ("div", 2),
            ("rem", 2),
            ("floor", 1),
            ("ceil", 1),
        ]
        .into_iter()
        .map(|(n, a)| (n.to_owned(), a))
        .collect();

        let sigils = ['C', 'D', 'N', 'R', 'S', 'T', 'U', 'c', 'r', 's', 'w']
            .into_iter()
            .collect();

        let mut modules = HashMap::new();
        modules.insert(
            "String".to_owned(),
            ModulePolicy::Denylist(
                [("to_atom", 1), ("to_existing_atom", 1)]
                    .into_iter()
                    .map(|(n, a)| (n.to_owned(), a))
                    .collect(),
            ),
        );
        modules.insert("Map".to_owned(), ModulePolicy::AllFunctions);
        modules.insert("Enum".to_owned(), ModulePolicy::AllFunctions);
        modules.insert(
            "Access".to_owned(),
            ModulePolicy::Single("get".to_owned(), 2),
        );
        modules.insert(
            "Integer".to_owned(),
            ModulePolicy::Allowlist(
                [
                    ("to_string", 1),
                    ("parse", 1),
                    ("is_even", 1),
                    ("is_odd", 1),
                ]
                .into_iter()
                .map(|(n, a)| (n.to_owned(), a))
                .collect(),
            ),
        );
        modules.insert(
            "Float".to_owned(),
            ModulePolicy::Allowlist(
                [("round", 1), ("round", 2), ("to_string", 1)]
                    .into_iter()
                    .map(|(n, a)| (n.to_owned(), a))
                    .collect(),
            ),
        );
        modules.insert(
            "List".to_owned(),
            ModulePolicy::Allowlist(
                [
                    ("first", 1),
                    ("last", 1),
                    ("flatten", 1),
                    ("to_tuple", 1),
                ]
                .into_iter()
                .map(|(n, a)| (n.to_owned(), a))
                .collect(),
            ),
        );
        modules.insert("Kernel".to_owned(), ModulePolicy::AllFunctions);

        Whitelist {
            operators,
            kernel_guards,
            kernel_functions,
            sigils,
            modules,
        }
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Whitelist::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_denies_to_atom_but_allows_everything_else() {
        let wl = Whitelist::standard();
        assert!(!wl.allows_qualified_call("String", "to_atom", 1));
        assert!(!wl.allows_qualified_call("String", "to_existing_atom", 1));
        assert!(wl.allows_qualified_call("String", "upcase", 1));
        assert!(wl.allows_qualified_call("String", "split", 2));
    }

    #[test]
    fn map_allows_all_functions() {
        let wl = Whitelist::standard();
        assert!(wl.allows_qualified_call("Map", "put", 3));
        assert!(wl.allows_qualified_call("Map", "anything_at_all", 7));
    }

    #[test]
    fn access_allows_only_get_2() {
        let wl = Whitelist::standard();
        assert!(wl.allows_qualified_call("Access", "get", 2));
        assert!(!wl.allows_qualified_call("Access", "get", 3));
        assert!(!wl.allows_qualified_call("Access", "fetch", 2));
    }

    #[test]
    fn unknown_module_is_never_allowed() {
        let wl = Whitelist::standard();
        assert!(!wl.allows_qualified_call("File", "read!", 1));
        assert!(!wl.allows_qualified_call("System", "cmd", 2));
    }
}
