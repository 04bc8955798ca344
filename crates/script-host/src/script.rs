//! Loaded scripts and how to invoke them.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes};
use tracing::debug;

use crate::{
    constants::script::ENTRY_FUNCTION,
    host::{LoadedScript, ScriptHost, ScriptId},
    record::selector_of,
    teardown::{Teardown, TeardownAction},
    ScriptError,
};

/// Which flavour of a deployment script to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ScriptVariant {
    /// The regular script.
    #[default]
    #[display("standard")]
    Standard,
    /// The interop flavour; its entries and contracts carry an `Interop` suffix.
    #[display("interop")]
    Interop,
}

impl ScriptVariant {
    /// Selects the variant from a `use interop` flag.
    pub const fn from_flag(use_interop: bool) -> Self {
        if use_interop {
            Self::Interop
        } else {
            Self::Standard
        }
    }

    /// Applies the variant to a base name: `SystemConfig` becomes `SystemConfigInterop`.
    pub fn apply(self, base: &str) -> String {
        match self {
            Self::Standard => base.to_string(),
            Self::Interop => format!("{base}Interop"),
        }
    }
}

/// A handle to a script loaded in a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHandle {
    loaded: LoadedScript,
}

impl ScriptHandle {
    /// Wraps a loaded script.
    pub const fn new(loaded: LoadedScript) -> Self {
        Self { loaded }
    }

    /// The host id of the script.
    pub const fn id(&self) -> ScriptId {
        self.loaded.id
    }

    /// `source_unit:entry`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.loaded.source_unit, self.loaded.entry)
    }

    /// The resolved script.
    pub const fn loaded(&self) -> &LoadedScript {
        &self.loaded
    }

    /// Signature of the entry function, e.g. `run(address,address)`.
    pub fn signature(&self) -> String {
        format!(
            "{ENTRY_FUNCTION}({})",
            self.loaded
                .params
                .iter()
                .map(|param| param.sol_type_name().into_owned())
                .collect::<Vec<_>>()
                .join(",")
        )
    }

    /// Calls the entry function with `args`, checking them against the declared parameters.
    pub fn call<H: ScriptHost + ?Sized>(
        &self,
        host: &mut H,
        args: &[DynSolValue],
    ) -> Result<Bytes, ScriptError> {
        let params = &self.loaded.params;
        if params.len() != args.len() {
            return Err(ScriptError::WrongArity {
                script: self.name(),
                expected: params.len(),
                actual: args.len(),
            });
        }
        for (index, (param, arg)) in params.iter().zip(args).enumerate() {
            if !param.matches(arg) {
                return Err(ScriptError::InvalidArgument {
                    script: self.name(),
                    index,
                    expected: param.sol_type_name().into_owned(),
                });
            }
        }

        let mut calldata = selector_of(&self.signature()).to_vec();
        calldata.extend(DynSolValue::Tuple(args.to_vec()).abi_encode_params());
        debug!(target: "script_host::script", script = %self.name(), args = args.len(), "calling script");
        host.call_script(self.loaded.id, calldata.into())
    }

    /// Runs the script against an input and an output record address.
    pub fn run<H: ScriptHost + ?Sized>(
        &self,
        host: &mut H,
        input: Address,
        output: Address,
    ) -> Result<Bytes, ScriptError> {
        self.call(host, &[DynSolValue::Address(input), DynSolValue::Address(output)])
    }
}

/// Loads `entry` from `source_unit` and returns its handle together with the teardown that
/// unloads it.
pub fn load_script<H: ScriptHost + ?Sized>(
    host: &mut H,
    source_unit: &str,
    entry: &str,
) -> Result<(ScriptHandle, Teardown), ScriptError> {
    let loaded = host.load_script(source_unit, entry)?;
    let handle = ScriptHandle::new(loaded);
    debug!(target: "script_host::script", script = %handle.name(), id = %handle.id(), "loaded script");
    let teardown = Teardown::new(
        format!("unload {}", handle.name()),
        TeardownAction::UnloadScript { script: handle.id() },
    );
    Ok((handle, teardown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_dyn_abi::DynSolType;

    fn handle(params: Vec<DynSolType>) -> ScriptHandle {
        ScriptHandle::new(LoadedScript {
            id: ScriptId(1),
            source_unit: "Deploy.s.sol".to_string(),
            entry: "Deploy".to_string(),
            params,
        })
    }

    #[test]
    fn test_variant() {
        assert_eq!(ScriptVariant::from_flag(false), ScriptVariant::Standard);
        assert_eq!(ScriptVariant::from_flag(true).apply("SystemConfig"), "SystemConfigInterop");
        assert_eq!(ScriptVariant::Standard.apply("SystemConfig"), "SystemConfig");
    }

    #[test]
    fn test_signature() {
        let handle = handle(vec![DynSolType::Address, DynSolType::Address]);
        assert_eq!(handle.signature(), "run(address,address)");
        assert_eq!(handle.name(), "Deploy.s.sol:Deploy");
    }

    #[test]
    fn test_arity_checked_before_host_call() {
        let mut host = crate::MemoryHost::default();
        let handle = handle(vec![DynSolType::Address, DynSolType::Address]);
        let err = handle.call(&mut host, &[DynSolValue::Address(Address::ZERO)]).unwrap_err();
        assert!(matches!(err, ScriptError::WrongArity { expected: 2, actual: 1, .. }));

        let err = handle
            .call(&mut host, &[DynSolValue::Address(Address::ZERO), DynSolValue::Bool(true)])
            .unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { index: 1, .. }));
    }
}
