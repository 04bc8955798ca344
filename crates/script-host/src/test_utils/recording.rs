use std::collections::{HashSet, VecDeque};

use alloy_primitives::{Address, Bytes};

use crate::{
    host::{BindingId, LoadedScript, ScriptHost, ScriptId},
    precompiles::DynPrecompile,
    MemoryHost, ScriptError,
};

/// A host operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum HostOp {
    /// [`ScriptHost::install_precompile`]
    #[display("install_precompile")]
    InstallPrecompile,
    /// [`ScriptHost::remove_precompile`]
    #[display("remove_precompile")]
    RemovePrecompile,
    /// [`ScriptHost::load_script`]
    #[display("load_script")]
    LoadScript,
    /// [`ScriptHost::unload_script`]
    #[display("unload_script")]
    UnloadScript,
    /// [`ScriptHost::remember_on_label`]
    #[display("remember_on_label")]
    RememberOnLabel,
    /// [`ScriptHost::forget_label`]
    #[display("forget_label")]
    ForgetLabel,
    /// [`ScriptHost::call_script`]
    #[display("call_script")]
    CallScript,
}

/// A host call observed by a [`RecordingHost`], recorded before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// An address was handed out.
    NewAddress(Address),
    /// A precompile install was attempted.
    InstallPrecompile(Address),
    /// A precompile removal was attempted.
    RemovePrecompile(Address, BindingId),
    /// A script load was attempted.
    LoadScript {
        /// The requested source unit
        source_unit: String,
        /// The requested entry
        entry: String,
    },
    /// A script unload was attempted.
    UnloadScript(ScriptId),
    /// An address was labelled.
    LabelAddress(Address, String),
    /// A deployment label was requested.
    RememberOnLabel {
        /// The label
        label: String,
        /// The source unit of the symbol
        source_unit: String,
        /// The symbol
        symbol: String,
    },
    /// A pending deployment label was dropped.
    ForgetLabel {
        /// The label
        label: String,
        /// The source unit of the symbol
        source_unit: String,
        /// The symbol
        symbol: String,
    },
    /// A script was called.
    CallScript(ScriptId),
}

/// A [`MemoryHost`] that records every host call and can be told to fail some of them.
#[derive(Debug, Default, derive_more::Deref, derive_more::DerefMut)]
pub struct RecordingHost {
    #[deref]
    #[deref_mut]
    inner: MemoryHost,
    events: Vec<HostEvent>,
    failing: HashSet<HostOp>,
    forced_addresses: VecDeque<Address>,
}

impl RecordingHost {
    /// Wraps `inner`.
    pub fn new(inner: MemoryHost) -> Self {
        Self { inner, ..Default::default() }
    }

    /// Makes every later call of `op` fail with [`ScriptError::Host`].
    pub fn fail_on(mut self, op: HostOp) -> Self {
        self.set_failing(op);
        self
    }

    /// Makes every later call of `op` fail with [`ScriptError::Host`].
    pub fn set_failing(&mut self, op: HostOp) {
        self.failing.insert(op);
    }

    /// Stops injecting failures.
    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Makes the next [`ScriptHost::new_script_address`] return `address`.
    pub fn force_next_address(&mut self, address: Address) {
        self.forced_addresses.push_back(address);
    }

    /// The recorded events.
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Returns and clears the recorded events.
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    /// The wrapped host.
    pub fn into_inner(self) -> MemoryHost {
        self.inner
    }

    fn check(&self, op: HostOp) -> Result<(), ScriptError> {
        if self.failing.contains(&op) {
            return Err(ScriptError::Host(format!("injected {op} failure")));
        }
        Ok(())
    }
}

impl ScriptHost for RecordingHost {
    fn new_script_address(&mut self) -> Address {
        let address =
            self.forced_addresses.pop_front().unwrap_or_else(|| self.inner.new_script_address());
        self.events.push(HostEvent::NewAddress(address));
        address
    }

    fn install_precompile(
        &mut self,
        address: Address,
        precompile: DynPrecompile,
    ) -> Result<BindingId, ScriptError> {
        self.events.push(HostEvent::InstallPrecompile(address));
        self.check(HostOp::InstallPrecompile)?;
        self.inner.install_precompile(address, precompile)
    }

    fn remove_precompile(&mut self, address: Address, id: BindingId) -> Result<bool, ScriptError> {
        self.events.push(HostEvent::RemovePrecompile(address, id));
        self.check(HostOp::RemovePrecompile)?;
        self.inner.remove_precompile(address, id)
    }

    fn load_script(&mut self, source_unit: &str, entry: &str) -> Result<LoadedScript, ScriptError> {
        self.events.push(HostEvent::LoadScript {
            source_unit: source_unit.to_string(),
            entry: entry.to_string(),
        });
        self.check(HostOp::LoadScript)?;
        self.inner.load_script(source_unit, entry)
    }

    fn unload_script(&mut self, id: ScriptId) -> Result<bool, ScriptError> {
        self.events.push(HostEvent::UnloadScript(id));
        self.check(HostOp::UnloadScript)?;
        self.inner.unload_script(id)
    }

    fn label_address(&mut self, address: Address, label: &str) {
        self.events.push(HostEvent::LabelAddress(address, label.to_string()));
        self.inner.label_address(address, label);
    }

    fn remember_on_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<(), ScriptError> {
        self.events.push(HostEvent::RememberOnLabel {
            label: label.to_string(),
            source_unit: source_unit.to_string(),
            symbol: symbol.to_string(),
        });
        self.check(HostOp::RememberOnLabel)?;
        self.inner.remember_on_label(label, source_unit, symbol)
    }

    fn forget_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<bool, ScriptError> {
        self.events.push(HostEvent::ForgetLabel {
            label: label.to_string(),
            source_unit: source_unit.to_string(),
            symbol: symbol.to_string(),
        });
        self.check(HostOp::ForgetLabel)?;
        self.inner.forget_label(label, source_unit, symbol)
    }

    fn call_script(&mut self, id: ScriptId, calldata: Bytes) -> Result<Bytes, ScriptError> {
        self.events.push(HostEvent::CallScript(id));
        self.check(HostOp::CallScript)?;
        self.inner.call_script(id, calldata)
    }
}
