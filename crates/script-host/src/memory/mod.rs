//! An in-memory [`ScriptHost`] running native Rust scripts.
//!
//! [`MemoryHost`] keeps every piece of host state in plain maps: installed precompiles, loaded
//! scripts, deployed contract symbols and labels. Scripts are [`Script`] values that talk to the
//! host through a [`ScriptContext`] with the same calldata a contract would send.

mod artifacts;
mod context;
mod trace;

use std::{collections::HashMap, fmt, rc::Rc};

use alloy_primitives::{keccak256, Address, Bytes, Selector, U256};
use tracing::{debug, trace};

pub use artifacts::*;
pub use context::ScriptContext;
pub use trace::*;

use crate::{
    config::HostConfig,
    host::{BindingId, LoadedScript, ScriptHost, ScriptId},
    label::LabelRegistry,
    precompiles::{DynPrecompile, Precompile, PrecompileInput, PrecompileTable},
    ScriptError,
};

struct LoadedEntry {
    name: String,
    address: Address,
    script: Rc<dyn Script>,
}

impl fmt::Debug for LoadedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedEntry")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// The reference [`ScriptHost`].
///
/// Deployed contracts and the call trace outlive sessions: a host used for several sessions keeps
/// every deployment and every recorded call until [`MemoryHost::clear_trace`] drops the calls.
#[derive(Debug, Default)]
pub struct MemoryHost {
    config: HostConfig,
    nonce: u64,
    next_script: u64,
    precompiles: PrecompileTable,
    artifacts: ArtifactStore,
    labels: LabelRegistry,
    scripts: HashMap<ScriptId, LoadedEntry>,
    script_addresses: HashMap<Address, ScriptId>,
    deployments: HashMap<Address, (String, String)>,
    trace: CallTrace,
}

impl MemoryHost {
    /// Creates a host with `config`.
    pub fn new(config: HostConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Creates a host with `config` and the artifacts of `artifacts`.
    pub fn with_artifacts(config: HostConfig, artifacts: ArtifactStore) -> Self {
        Self { config, artifacts, ..Default::default() }
    }

    /// The host configuration.
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The known source units.
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Mutable access to the known source units.
    pub fn artifacts_mut(&mut self) -> &mut ArtifactStore {
        &mut self.artifacts
    }

    /// The address labels.
    pub const fn labels(&self) -> &LabelRegistry {
        &self.labels
    }

    /// Mutable access to the address labels.
    pub fn labels_mut(&mut self) -> &mut LabelRegistry {
        &mut self.labels
    }

    /// The installed precompiles.
    pub const fn precompiles(&self) -> &PrecompileTable {
        &self.precompiles
    }

    /// Whether a precompile is installed at `address`.
    pub fn has_precompile(&self, address: &Address) -> bool {
        self.precompiles.contains(address)
    }

    /// Number of loaded scripts.
    pub fn loaded_scripts(&self) -> usize {
        self.scripts.len()
    }

    /// The address a loaded script runs at.
    pub fn script_address(&self, id: ScriptId) -> Option<Address> {
        self.scripts.get(&id).map(|entry| entry.address)
    }

    /// The `(source unit, symbol)` deployed at `address`.
    pub fn deployment_at(&self, address: &Address) -> Option<(&str, &str)> {
        self.deployments.get(address).map(|(unit, symbol)| (unit.as_str(), symbol.as_str()))
    }

    /// The recorded calls.
    pub const fn trace(&self) -> &CallTrace {
        &self.trace
    }

    /// Drops the recorded calls. Deployments are kept.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Renders the recorded calls, naming addresses by their labels.
    pub fn render_trace(&self) -> String {
        self.trace.render(&self.labels)
    }

    fn is_occupied(&self, address: &Address) -> bool {
        self.precompiles.contains(address) ||
            self.script_addresses.contains_key(address) ||
            self.deployments.contains_key(address)
    }

    /// Derives the next free address from the namespace and an internal nonce.
    fn allocate(&mut self) -> Address {
        loop {
            self.nonce += 1;
            let mut preimage = self.config.address_namespace.as_bytes().to_vec();
            preimage.extend_from_slice(&self.nonce.to_be_bytes());
            let address = Address::from_word(keccak256(&preimage));
            if !self.is_occupied(&address) {
                return address;
            }
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), Revert> {
        if depth > self.config.max_call_depth {
            return Err(Revert::new(format!(
                "call depth {depth} exceeds {}",
                self.config.max_call_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn dispatch(
        &mut self,
        caller: Address,
        to: Address,
        data: &[u8],
        depth: usize,
    ) -> Result<Bytes, Revert> {
        self.check_depth(depth)?;

        let precompile = self.precompiles.get(&to).cloned();
        let script = self.script_addresses.get(&to).copied();
        let kind = match (&precompile, script) {
            (Some(_), _) => FrameKind::Precompile,
            (None, Some(_)) => FrameKind::Script,
            (None, None) => FrameKind::Empty,
        };
        let selector = (data.len() >= 4).then(|| Selector::from_slice(&data[..4]));
        let frame = self.trace.push(CallFrame {
            depth,
            caller,
            target: to,
            kind,
            selector,
            revert: None,
        });
        trace!(target: "script_host::memory", %caller, %to, %kind, depth, "call");

        let result = match (precompile, script) {
            (Some(precompile), _) => self.call_precompile(&precompile, caller, data),
            (None, Some(id)) => self.invoke(id, data, depth),
            (None, None) => Ok(Bytes::new()),
        };
        if let Err(revert) = &result {
            self.trace.set_revert(frame, revert.reason.clone());
        }
        result
    }

    fn call_precompile(
        &self,
        precompile: &DynPrecompile,
        caller: Address,
        data: &[u8],
    ) -> Result<Bytes, Revert> {
        let input =
            PrecompileInput { data, gas: self.config.call_gas_limit, caller, value: U256::ZERO };
        match precompile.call(input) {
            Ok(output) if output.reverted => Err(Revert::new("precompile reverted")),
            Ok(output) => Ok(output.bytes),
            Err(err) => Err(Revert::new(err.to_string())),
        }
    }

    fn invoke(&mut self, id: ScriptId, data: &[u8], depth: usize) -> Result<Bytes, Revert> {
        let entry = self.scripts.get(&id).ok_or_else(|| Revert::new(format!("{id} is not loaded")))?;
        let script = entry.script.clone();
        let address = entry.address;
        let mut ctx = ScriptContext::new(self, address, depth);
        script.call(&mut ctx, data)
    }

    pub(crate) fn deploy(
        &mut self,
        caller: Address,
        source_unit: &str,
        symbol: &str,
        depth: usize,
    ) -> Result<Address, Revert> {
        self.check_depth(depth)?;
        self.artifacts.resolve_contract(source_unit, symbol)?;
        let address = self.allocate();
        self.deployments.insert(address, (source_unit.to_string(), symbol.to_string()));
        let label = self.labels.on_deploy(source_unit, symbol, address).map(str::to_string);
        debug!(target: "script_host::memory", %address, source_unit, symbol, ?label, "deployed contract");
        self.trace.push(CallFrame {
            depth,
            caller,
            target: address,
            kind: FrameKind::Deploy,
            selector: None,
            revert: None,
        });
        Ok(address)
    }
}

impl ScriptHost for MemoryHost {
    fn new_script_address(&mut self) -> Address {
        self.allocate()
    }

    fn install_precompile(
        &mut self,
        address: Address,
        precompile: DynPrecompile,
    ) -> Result<BindingId, ScriptError> {
        if self.script_addresses.contains_key(&address) || self.deployments.contains_key(&address) {
            return Err(ScriptError::AddressCollision { address });
        }
        self.precompiles.insert(address, precompile)
    }

    fn remove_precompile(&mut self, address: Address, id: BindingId) -> Result<bool, ScriptError> {
        let removed = self.precompiles.remove(address, id);
        trace!(target: "script_host::memory", %address, binding = %id, removed, "remove precompile");
        Ok(removed)
    }

    fn load_script(&mut self, source_unit: &str, entry: &str) -> Result<LoadedScript, ScriptError> {
        let (script, params) = self.artifacts.resolve_script(source_unit, entry)?;
        self.next_script += 1;
        let id = ScriptId(self.next_script);
        let address = self.allocate();
        self.labels.label(address, entry);
        self.script_addresses.insert(address, id);
        self.scripts.insert(
            id,
            LoadedEntry { name: format!("{source_unit}:{entry}"), address, script },
        );
        Ok(LoadedScript {
            id,
            source_unit: source_unit.to_string(),
            entry: entry.to_string(),
            params,
        })
    }

    fn unload_script(&mut self, id: ScriptId) -> Result<bool, ScriptError> {
        let Some(entry) = self.scripts.remove(&id) else {
            return Ok(false);
        };
        self.script_addresses.remove(&entry.address);
        trace!(target: "script_host::memory", script = %entry.name, "unloaded script");
        Ok(true)
    }

    fn label_address(&mut self, address: Address, label: &str) {
        self.labels.label(address, label);
    }

    fn remember_on_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<(), ScriptError> {
        self.artifacts.resolve_symbol(source_unit, symbol)?;
        self.labels.remember(label, source_unit, symbol);
        Ok(())
    }

    fn forget_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<bool, ScriptError> {
        Ok(self.labels.forget(label, source_unit, symbol))
    }

    fn call_script(&mut self, id: ScriptId, calldata: Bytes) -> Result<Bytes, ScriptError> {
        let (name, address) = match self.scripts.get(&id) {
            Some(entry) => (entry.name.clone(), entry.address),
            None => return Err(ScriptError::Host(format!("{id} is not loaded"))),
        };
        let sender = self.config.sender;
        self.dispatch(sender, address, &calldata, 1)
            .map_err(|revert| ScriptError::ScriptExecutionFailed { script: name, reason: revert.reason })
    }
}
