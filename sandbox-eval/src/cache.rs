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

//! Stage C: a process-wide, keyed cache of installed modules (spec §4.7).
//!
//! Keyed by `module_id` only, exactly as described — not by a hash of the
//! source. A caller that reuses a `module_id` with different code while
//! `persistent=true` gets back the previously installed module; see
//! Open Question OQ-2 in `SPEC_FULL.md`. `clear_cache` is the caller's
//! escape hatch rather than a silent fix.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::runtime::ModuleHandle;

struct CachedModule {
    handle: ModuleHandle,
    exports: HashSet<(String, u32)>,
}

pub struct ModuleCache {
    entries: Mutex<HashMap<String, CachedModule>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        ModuleCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the installed handle iff `module_id` is cached *and* it
    /// exports `function_id/arity`. A cache hit here lets the caller skip
    /// P/S/N/V entirely.
    pub fn lookup(&self, module_id: &str, function_id: &str, arity: u32) -> Option<ModuleHandle> {
        let entries = self.entries.lock();
        entries.get(module_id).and_then(|cached| {
            cached
                .exports
                .contains(&(function_id.to_owned(), arity))
                .then_some(cached.handle)
        })
    }

    pub fn insert(&self, module_id: String, handle: ModuleHandle, exports: HashSet<(String, u32)>) {
        self.entries
            .lock()
            .insert(module_id, CachedModule { handle, exports });
    }

    /// Evicts `module_id`, returning the handle it pointed to (if any) so
    /// the caller can ask the host to purge it.
    pub fn remove(&self, module_id: &str) -> Option<ModuleHandle> {
        self.entries.lock().remove(module_id).map(|c| c.handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        ModuleCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_misses_on_unknown_module_or_export() {
        let cache = ModuleCache::new();
        cache.insert(
            "M".to_owned(),
            ModuleHandle(1),
            [("f".to_owned(), 1)].into_iter().collect(),
        );
        assert_eq!(cache.lookup("M", "f", 1), Some(ModuleHandle(1)));
        assert_eq!(cache.lookup("M", "f", 2), None);
        assert_eq!(cache.lookup("Other", "f", 1), None);
    }

    #[test]
    fn remove_evicts_and_returns_handle() {
        let cache = ModuleCache::new();
        cache.insert("M".to_owned(), ModuleHandle(7), HashSet::new());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove("M"), Some(ModuleHandle(7)));
        assert!(cache.is_empty());
    }
}
