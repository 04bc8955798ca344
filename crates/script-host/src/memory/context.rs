use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes};

use super::{MemoryHost, Revert};
use crate::{
    codec::{
        decode_getter_output, decode_snapshot_output, encode_patch, getter_calldata,
        setter_calldata, snapshot_calldata,
    },
    FieldType, Record, RecordLayout, RecordPatch,
};

/// What a running script sees of the host.
#[derive(Debug)]
pub struct ScriptContext<'a> {
    host: &'a mut MemoryHost,
    address: Address,
    depth: usize,
}

impl<'a> ScriptContext<'a> {
    pub(super) fn new(host: &'a mut MemoryHost, address: Address, depth: usize) -> Self {
        Self { host, address, depth }
    }

    /// The address of the running script.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The call depth of the running script.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// The host.
    pub fn host(&self) -> &MemoryHost {
        &*self.host
    }

    /// Calls `to` with `data`: a precompile, another loaded script or an empty account.
    pub fn call(&mut self, to: Address, data: &[u8]) -> Result<Bytes, Revert> {
        self.host.dispatch(self.address, to, data, self.depth + 1)
    }

    /// Deploys `symbol` of `source_unit` and returns its address.
    pub fn deploy(&mut self, source_unit: &str, symbol: &str) -> Result<Address, Revert> {
        self.host.deploy(self.address, source_unit, symbol, self.depth + 1)
    }

    /// Labels `address`.
    pub fn label(&mut self, address: Address, label: &str) {
        self.host.labels_mut().label(address, label);
    }

    /// Reads the field `name` of type `ty` from the record precompile at `record`.
    pub fn get(
        &mut self,
        record: Address,
        name: &str,
        ty: &FieldType,
    ) -> Result<DynSolValue, Revert> {
        let output = self.call(record, &getter_calldata(name))?;
        Ok(decode_getter_output(ty, &output)?)
    }

    /// Writes the field `name` of type `ty` of the record precompile at `record`.
    pub fn set(
        &mut self,
        record: Address,
        name: &str,
        ty: &FieldType,
        value: DynSolValue,
    ) -> Result<(), Revert> {
        let calldata = setter_calldata(name, ty, value)?;
        self.call(record, &calldata)?;
        Ok(())
    }

    /// Writes every field of `patch` to the record precompile at `record`.
    pub fn write(&mut self, record: Address, patch: &RecordPatch) -> Result<(), Revert> {
        self.call(record, &encode_patch(patch))?;
        Ok(())
    }

    /// Reads the whole record of `layout` from the record precompile at `record`.
    pub fn snapshot(
        &mut self,
        record: Address,
        layout: &Arc<RecordLayout>,
    ) -> Result<Record, Revert> {
        let output = self.call(record, &snapshot_calldata())?;
        Ok(decode_snapshot_output(layout, &output)?)
    }
}
