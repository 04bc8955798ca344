use std::{collections::HashMap, fmt, rc::Rc};

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall};

use super::ScriptContext;
use crate::{CodecError, ScriptError, Unresolved};

sol! {
    /// Entry point of deployment scripts.
    interface IDeployScript {
        /// Reads the input record at `input` and writes the output record at `output`.
        function run(address input, address output) external;
    }
}

/// A script failure, the equivalent of a revert with a reason string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Revert {
    /// The revert reason.
    pub reason: String,
}

impl Revert {
    /// Creates a revert with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl From<CodecError> for Revert {
    fn from(err: CodecError) -> Self {
        Self::new(err.to_string())
    }
}

/// A script executed natively by the [`MemoryHost`](super::MemoryHost).
pub trait Script {
    /// Handles a call with `calldata`. The context gives access to precompiles, other scripts and
    /// deployments.
    fn call(&self, ctx: &mut ScriptContext<'_>, calldata: &[u8]) -> Result<Bytes, Revert>;
}

impl<F> Script for F
where
    F: Fn(&mut ScriptContext<'_>, &[u8]) -> Result<Bytes, Revert>,
{
    fn call(&self, ctx: &mut ScriptContext<'_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        self(ctx, calldata)
    }
}

/// Decodes the `(input, output)` arguments of a deployment script entry.
pub fn decode_run_args(calldata: &[u8]) -> Result<(Address, Address), Revert> {
    let call = IDeployScript::runCall::abi_decode(calldata)
        .map_err(|err| Revert::new(format!("invalid run arguments: {err}")))?;
    Ok((call.input, call.output))
}

/// An item of a source unit.
#[derive(Clone)]
pub enum Artifact {
    /// A script entry with its parameter types.
    Script {
        /// The implementation
        script: Rc<dyn Script>,
        /// The declared parameters
        params: Vec<DynSolType>,
    },
    /// A deployable contract.
    Contract,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script { params, .. } => f.debug_struct("Script").field("params", params).finish(),
            Self::Contract => f.write_str("Contract"),
        }
    }
}

/// Source units known to a host, each holding named scripts and contracts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    units: HashMap<String, HashMap<String, Artifact>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a deployment script taking `(address input, address output)`.
    pub fn add_script(&mut self, source_unit: &str, entry: &str, script: impl Script + 'static) {
        self.add_script_with_params(
            source_unit,
            entry,
            vec![DynSolType::Address, DynSolType::Address],
            script,
        );
    }

    /// Adds a deployment script from a closure.
    pub fn add_script_fn<F>(&mut self, source_unit: &str, entry: &str, f: F)
    where
        F: Fn(&mut ScriptContext<'_>, &[u8]) -> Result<Bytes, Revert> + 'static,
    {
        self.add_script(source_unit, entry, f);
    }

    /// Adds a script with explicit parameter types.
    pub fn add_script_with_params(
        &mut self,
        source_unit: &str,
        entry: &str,
        params: Vec<DynSolType>,
        script: impl Script + 'static,
    ) {
        self.units
            .entry(source_unit.to_string())
            .or_default()
            .insert(entry.to_string(), Artifact::Script { script: Rc::new(script), params });
    }

    /// Adds a deployable contract symbol.
    pub fn add_contract(&mut self, source_unit: &str, symbol: &str) {
        self.units
            .entry(source_unit.to_string())
            .or_default()
            .insert(symbol.to_string(), Artifact::Contract);
    }

    /// Looks up an artifact.
    pub fn get(&self, source_unit: &str, name: &str) -> Option<&Artifact> {
        self.units.get(source_unit).and_then(|unit| unit.get(name))
    }

    /// Resolves a script entry.
    pub fn resolve_script(
        &self,
        source_unit: &str,
        entry: &str,
    ) -> Result<(Rc<dyn Script>, Vec<DynSolType>), ScriptError> {
        let unresolved = |missing| ScriptError::UnresolvedScript {
            source_unit: source_unit.to_string(),
            entry: entry.to_string(),
            missing,
        };
        let unit = self.units.get(source_unit).ok_or_else(|| unresolved(Unresolved::SourceUnit))?;
        match unit.get(entry) {
            Some(Artifact::Script { script, params }) => Ok((script.clone(), params.clone())),
            _ => Err(unresolved(Unresolved::Entry)),
        }
    }

    /// Checks that `symbol` exists in `source_unit`.
    pub fn resolve_symbol(&self, source_unit: &str, symbol: &str) -> Result<(), ScriptError> {
        if self.get(source_unit, symbol).is_none() {
            return Err(ScriptError::UnresolvedLabelSymbol {
                source_unit: source_unit.to_string(),
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }

    /// Checks that `symbol` is a deployable contract of `source_unit`.
    pub fn resolve_contract(&self, source_unit: &str, symbol: &str) -> Result<(), Revert> {
        match self.get(source_unit, symbol) {
            Some(Artifact::Contract) => Ok(()),
            _ => Err(Revert::new(format!("unknown contract {source_unit}:{symbol}"))),
        }
    }
}
