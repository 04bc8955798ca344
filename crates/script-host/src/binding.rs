//! Precompiles that expose a host record to scripts.

use std::{cell::RefCell, rc::Rc};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes};
use revm::precompile::{PrecompileError, PrecompileOutput, PrecompileResult};
use tracing::{debug, trace};

use crate::{
    codec::{decode_call, encode_record, RecordCall},
    constants::precompile::{RECORD_CALL_BASE_GAS, RECORD_CALL_WORD_GAS},
    host::ScriptHost,
    precompiles::{DynPrecompile, Precompile, PrecompileInput},
    teardown::{Teardown, TeardownAction},
    CodecError, Record, ScriptError,
};

/// What a record precompile lets scripts do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PrecompileMode {
    /// Scripts may only read the record.
    #[display("decode-only")]
    DecodeOnly,
    /// Scripts may read and write the record.
    #[display("decode-and-apply")]
    DecodeAndApply,
}

/// A precompile serving reads and, depending on the mode, writes of a shared record.
///
/// The record is shared with the host, so writes applied by scripts are visible to the host as
/// soon as the call returns.
#[derive(Debug, Clone)]
pub struct RecordPrecompile {
    record: Rc<RefCell<Record>>,
    mode: PrecompileMode,
}

impl RecordPrecompile {
    /// Creates a precompile over `record`.
    pub const fn new(record: Rc<RefCell<Record>>, mode: PrecompileMode) -> Self {
        Self { record, mode }
    }

    /// The mode of the precompile.
    pub const fn mode(&self) -> PrecompileMode {
        self.mode
    }

    /// Gas charged for a call with `len` bytes of calldata.
    pub const fn gas_cost(len: usize) -> u64 {
        RECORD_CALL_BASE_GAS + RECORD_CALL_WORD_GAS * (len as u64).div_ceil(32)
    }

    fn dispatch(&self, data: &[u8]) -> Result<Bytes, PrecompileError> {
        let layout = self.record.try_borrow().map_err(fatal)?.layout().clone();
        let call = decode_call(&layout, data).map_err(other)?;
        match call {
            RecordCall::Get(index) => {
                let record = self.record.try_borrow().map_err(fatal)?;
                let value = record.value(index).ok_or_else(|| {
                    other(CodecError::UnknownField {
                        record: layout.name().to_string(),
                        field: format!("#{index}"),
                    })
                })?;
                Ok(value.abi_encode().into())
            }
            RecordCall::Snapshot => {
                let record = self.record.try_borrow().map_err(fatal)?;
                Ok(DynSolValue::Bytes(encode_record(&record).to_vec()).abi_encode().into())
            }
            RecordCall::Write(patch) => {
                if self.mode == PrecompileMode::DecodeOnly {
                    return Err(other(CodecError::ReadOnlyRecord(layout.name().to_string())));
                }
                trace!(
                    target: "script_host::binding",
                    record = layout.name(),
                    fields = patch.len(),
                    "applying patch"
                );
                self.record.try_borrow_mut().map_err(fatal)?.apply(&patch).map_err(other)?;
                Ok(Bytes::new())
            }
        }
    }
}

impl Precompile for RecordPrecompile {
    fn call(&self, input: PrecompileInput<'_>) -> PrecompileResult {
        let gas_used = Self::gas_cost(input.data.len());
        if input.gas < gas_used {
            return Err(PrecompileError::OutOfGas);
        }
        let bytes = self.dispatch(input.data)?;
        Ok(PrecompileOutput { gas_used, bytes, reverted: false })
    }
}

fn other(err: CodecError) -> PrecompileError {
    PrecompileError::Other(err.to_string().into())
}

fn fatal(err: impl std::fmt::Display) -> PrecompileError {
    PrecompileError::Fatal(format!("record is busy: {err}").into())
}

/// Installs a record precompile at `address` and returns the teardown that removes it.
pub fn install_record_precompile<H: ScriptHost + ?Sized>(
    host: &mut H,
    address: Address,
    record: Rc<RefCell<Record>>,
    mode: PrecompileMode,
) -> Result<Teardown, ScriptError> {
    let name = record.borrow().layout().name().to_string();
    let precompile = DynPrecompile::from_precompile(RecordPrecompile::new(record, mode));
    let binding = host.install_precompile(address, precompile)?;
    debug!(
        target: "script_host::binding",
        record = %name,
        %address,
        %binding,
        %mode,
        "installed record precompile"
    );
    Ok(Teardown::new(
        format!("remove {name} precompile at {address}"),
        TeardownAction::RemovePrecompile { address, binding },
    ))
}
