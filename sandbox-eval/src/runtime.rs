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

//! Stage R: the runtime adaptor (spec §4.6).
//!
//! The actual interpretation of an admitted module is delegated to a
//! [`Host`] implementation — mirroring how the teacher's `Runner` hands
//! opcode execution to an external `evm` crate — so this crate never
//! depends on an interpreter directly. `sandbox-host::TreeWalkHost` is the
//! default implementation shipped in this workspace.

use parking_lot::Mutex;

use sandbox_ast::{Node, Value};

/// An opaque reference to a module a [`Host`] has installed. Hosts are
/// free to choose the internal representation; only the numeric identity
/// is exposed here; it is what `ModuleCache` keys its entries' targets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// The pluggable execution seam for admitted ASTs (spec §9's `install`/
/// `invoke`/`purge` re-architecture note).
pub trait Host: Send + Sync {
    /// Compiles/installs an admitted module AST (the full `defmodule`
    /// tree, already accepted by stage V) under `module_id`.
    fn install(&self, module_id: &str, module_ast: &Node) -> Result<ModuleHandle, String>;

    /// Invokes `function_id(args…)` on a previously installed module.
    fn invoke(
        &self,
        handle: ModuleHandle,
        function_id: &str,
        args: &[Value],
    ) -> Result<Value, String>;

    /// Purges a previously installed module, freeing any resources the host
    /// associates with its handle.
    fn purge(&self, handle: ModuleHandle);
}

/// Serializes install/purge calls behind a single process-wide mutex, which
/// spec §5 notes is sufficient ("a per-module mutex, or a process-wide
/// install mutex"). Earlier stages (L/P/S/N/V) require no locking at all.
pub struct RuntimeAdaptor<H> {
    host: H,
    install_lock: Mutex<()>,
}

impl<H: Host> RuntimeAdaptor<H> {
    pub fn new(host: H) -> Self {
        RuntimeAdaptor {
            host,
            install_lock: Mutex::new(()),
        }
    }

    pub fn install(&self, module_id: &str, module_ast: &Node) -> Result<ModuleHandle, String> {
        let _guard = self.install_lock.lock();
        self.host.install(module_id, module_ast)
    }

    pub fn invoke(
        &self,
        handle: ModuleHandle,
        function_id: &str,
        args: &[Value],
    ) -> Result<Value, String> {
        self.host.invoke(handle, function_id, args)
    }

    pub fn purge(&self, handle: ModuleHandle) {
        let _guard = self.install_lock.lock();
        self.host.purge(handle);
    }
}
