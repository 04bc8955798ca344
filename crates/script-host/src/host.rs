//! The host capabilities a deployment session relies on.

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, Bytes};
use auto_impl::auto_impl;

use crate::{precompiles::DynPrecompile, ScriptError};

/// Identifies one precompile installation.
///
/// Ids are never reused within a host, so a stale id can not remove a later binding at the same
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("binding#{_0}")]
pub struct BindingId(pub u64);

/// Identifies a loaded script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("script#{_0}")]
pub struct ScriptId(pub u64);

/// A script resolved and loaded by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    /// The id to call the script with.
    pub id: ScriptId,
    /// The source unit the script was resolved from.
    pub source_unit: String,
    /// The entry within the source unit.
    pub entry: String,
    /// The declared parameter types of the entry function.
    pub params: Vec<DynSolType>,
}

/// The scripting host: it allocates addresses, hosts precompiles, loads and runs scripts and
/// keeps human-readable labels for addresses.
///
/// Every method takes `&mut self`; a host is driven by one session at a time.
#[auto_impl(&mut, Box)]
pub trait ScriptHost {
    /// Returns a fresh address that holds no precompile, script or contract.
    fn new_script_address(&mut self) -> Address;

    /// Installs `precompile` at `address`.
    ///
    /// Fails with [`ScriptError::AddressCollision`] if the address is already taken.
    fn install_precompile(
        &mut self,
        address: Address,
        precompile: DynPrecompile,
    ) -> Result<BindingId, ScriptError>;

    /// Removes the binding `id` from `address`. Returns `Ok(false)` if the binding is no longer
    /// installed.
    fn remove_precompile(&mut self, address: Address, id: BindingId) -> Result<bool, ScriptError>;

    /// Resolves `entry` in `source_unit` and loads it.
    fn load_script(&mut self, source_unit: &str, entry: &str) -> Result<LoadedScript, ScriptError>;

    /// Unloads a script. Returns `Ok(false)` if it was not loaded.
    fn unload_script(&mut self, id: ScriptId) -> Result<bool, ScriptError>;

    /// Attaches a human-readable label to `address`.
    fn label_address(&mut self, address: Address, label: &str);

    /// Asks the host to label the next deployment of `symbol` from `source_unit` with `label`.
    ///
    /// Fails with [`ScriptError::UnresolvedLabelSymbol`] if the symbol does not exist.
    fn remember_on_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<(), ScriptError>;

    /// Drops the label remembered for `symbol` of `source_unit` if it is still `label`. Returns
    /// `Ok(false)` if a deployment already consumed it or another label replaced it.
    fn forget_label(
        &mut self,
        label: &str,
        source_unit: &str,
        symbol: &str,
    ) -> Result<bool, ScriptError>;

    /// Calls the loaded script with ABI calldata and returns its output.
    fn call_script(&mut self, id: ScriptId, calldata: Bytes) -> Result<Bytes, ScriptError>;
}
