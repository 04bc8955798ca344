//! Wire codec for records and record precompile calls.
//!
//! # Record encoding
//!
//! A full record is `selector(signature) ++ abi.encode(fields...)`. The selector binds the payload
//! to the exact layout, so a payload produced for a reordered or renamed declaration fails to
//! decode with [`CodecError::LayoutMismatch`] instead of silently landing in the wrong fields.
//!
//! # Patch encoding
//!
//! A patch is `selector("patch(" ++ signature ++ ")") ++ abi.encode(uint256 mask, (fields...))`.
//! Bit `i` of `mask` marks position `i` as present; absent positions carry zero values and are
//! ignored on decode.
//!
//! # Precompile calls
//!
//! Scripts talk to a record precompile with ordinary calldata:
//!
//! | calldata | meaning |
//! |---|---|
//! | `<field>()` | read one field |
//! | `snapshot()` | read the whole record, returned as ABI `bytes` |
//! | `set(bytes4 getter, T value)` | write one field |
//! | record encoding | write every field |
//! | patch encoding | write the fields marked in the mask |

use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Bytes, Selector, B256, U256};
use alloy_sol_types::{sol, SolCall};

use crate::{
    record::{selector_of, type_mismatch},
    CodecError, FieldType, Record, RecordLayout, RecordPatch,
};

sol! {
    /// Methods every record precompile exposes next to its per-field getters.
    interface IRecordPrecompile {
        /// Returns the record encoding of the whole record.
        function snapshot() external view returns (bytes memory);
    }
}

fn abi_error(err: alloy_dyn_abi::Error) -> CodecError {
    CodecError::Abi(err.to_string())
}

fn split_selector(data: &[u8]) -> Result<(Selector, &[u8]), CodecError> {
    if data.len() < 4 {
        return Err(CodecError::ShortCalldata { len: data.len() });
    }
    Ok((Selector::from_slice(&data[..4]), &data[4..]))
}

fn strip_selector(data: &[u8], expected: Selector) -> Result<&[u8], CodecError> {
    let (actual, body) = split_selector(data)?;
    if actual != expected {
        return Err(CodecError::LayoutMismatch { expected, actual });
    }
    Ok(body)
}

fn with_selector(selector: Selector, body: Vec<u8>) -> Bytes {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(selector.as_slice());
    out.extend(body);
    out.into()
}

/// Encodes a full record.
pub fn encode_record(record: &Record) -> Bytes {
    with_selector(record.layout().selector(), record.to_sol_value().abi_encode_params())
}

/// Decodes a full record produced by [`encode_record`] for the same layout.
pub fn decode_record(layout: &Arc<RecordLayout>, data: &[u8]) -> Result<Record, CodecError> {
    let body = strip_selector(data, layout.selector())?;
    match layout.tuple_type().abi_decode_params(body).map_err(abi_error)? {
        DynSolValue::Tuple(values) => Record::from_values(layout.clone(), values),
        other => Err(type_mismatch(&FieldType::Record(layout.clone()), &other)),
    }
}

/// Encodes a patch.
pub fn encode_patch(patch: &RecordPatch) -> Bytes {
    let layout = patch.layout();
    let mut values = layout.zero_values();
    for (index, value) in patch.iter() {
        values[index] = value.clone();
    }
    let body = DynSolValue::Tuple(vec![
        DynSolValue::Uint(patch.mask(), 256),
        DynSolValue::Tuple(values),
    ])
    .abi_encode_params();
    with_selector(layout.patch_selector(), body)
}

/// Decodes a patch produced by [`encode_patch`] for the same layout.
pub fn decode_patch(layout: &Arc<RecordLayout>, data: &[u8]) -> Result<RecordPatch, CodecError> {
    let body = strip_selector(data, layout.patch_selector())?;
    let ty = DynSolType::Tuple(vec![DynSolType::Uint(256), layout.tuple_type()]);
    let decoded = ty.abi_decode_params(body).map_err(abi_error)?;
    let (mask, values) = match decoded {
        DynSolValue::Tuple(mut parts) if parts.len() == 2 => {
            let values = parts.pop();
            let mask = parts.pop();
            match (mask, values) {
                (Some(DynSolValue::Uint(mask, _)), Some(DynSolValue::Tuple(values))) => {
                    (mask, values)
                }
                _ => return Err(CodecError::Abi("malformed patch body".to_string())),
            }
        }
        _ => return Err(CodecError::Abi("malformed patch body".to_string())),
    };

    if layout.len() < 256 && (mask >> layout.len()) != U256::ZERO {
        return Err(CodecError::InvalidPatchMask { mask, fields: layout.len() });
    }

    let mut patch = RecordPatch::new(layout.clone());
    for (index, value) in values.into_iter().enumerate() {
        if mask.bit(index) {
            patch.set_at(index, value)?;
        }
    }
    Ok(patch)
}

/// Selector of the single-field setter for fields of type `ty`.
pub fn setter_selector(ty: &FieldType) -> Selector {
    selector_of(&format!("set(bytes4,{})", ty.abi_name()))
}

/// Calldata reading the field `name`.
pub fn getter_calldata(name: &str) -> Bytes {
    selector_of(&format!("{name}()")).to_vec().into()
}

/// Decodes the output of a getter for a field of type `ty`.
pub fn decode_getter_output(ty: &FieldType, data: &[u8]) -> Result<DynSolValue, CodecError> {
    let value = ty.sol_type().abi_decode(data).map_err(abi_error)?;
    ty.coerce(value)
}

/// Calldata writing `value` into the field `name` of type `ty`.
pub fn setter_calldata(name: &str, ty: &FieldType, value: DynSolValue) -> Result<Bytes, CodecError> {
    let value = ty.coerce(value)?;
    let getter = selector_of(&format!("{name}()"));
    let body = DynSolValue::Tuple(vec![
        DynSolValue::FixedBytes(B256::right_padding_from(getter.as_slice()), 4),
        value,
    ])
    .abi_encode_params();
    Ok(with_selector(setter_selector(ty), body))
}

/// Calldata reading the whole record.
pub fn snapshot_calldata() -> Bytes {
    IRecordPrecompile::snapshotCall {}.abi_encode().into()
}

/// Decodes the output of `snapshot()` into a record of `layout`.
pub fn decode_snapshot_output(
    layout: &Arc<RecordLayout>,
    data: &[u8],
) -> Result<Record, CodecError> {
    match DynSolType::Bytes.abi_decode(data).map_err(abi_error)? {
        DynSolValue::Bytes(encoded) => decode_record(layout, &encoded),
        other => Err(CodecError::TypeMismatch {
            expected: "bytes".to_string(),
            actual: other
                .sol_type_name()
                .map(|name| name.into_owned())
                .unwrap_or_else(|| "unknown".to_string()),
        }),
    }
}

/// A decoded call against a record precompile.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordCall {
    /// Read the field at the position.
    Get(usize),
    /// Read the whole record.
    Snapshot,
    /// Write the fields of the patch.
    Write(RecordPatch),
}

impl RecordCall {
    /// Whether the call mutates the record.
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Decodes calldata sent to a record precompile of `layout`.
pub fn decode_call(layout: &Arc<RecordLayout>, data: &[u8]) -> Result<RecordCall, CodecError> {
    let (selector, body) = split_selector(data)?;

    if selector == Selector::from(IRecordPrecompile::snapshotCall::SELECTOR) {
        return Ok(RecordCall::Snapshot);
    }
    if let Some(index) = layout.position_of_getter(selector) {
        return Ok(RecordCall::Get(index));
    }
    if selector == layout.patch_selector() {
        return decode_patch(layout, data).map(RecordCall::Write);
    }
    if selector == layout.selector() {
        let record = decode_record(layout, data)?;
        return Ok(RecordCall::Write(RecordPatch::from_record(&record)));
    }

    let Some(value_type) =
        layout.fields().iter().map(|field| field.ty()).find(|ty| setter_selector(ty) == selector)
    else {
        return Err(CodecError::UnknownSelector(selector));
    };
    // The target getter sits left-aligned in the first argument word.
    if body.len() < 32 {
        return Err(CodecError::Abi("setter arguments are too short".to_string()));
    }
    let target = Selector::from_slice(&body[..4]);
    let index = layout.position_of_getter(target).ok_or(CodecError::UnknownSelector(target))?;
    let field_type = layout.fields()[index].ty();
    if setter_selector(field_type) != selector {
        return Err(CodecError::TypeMismatch {
            expected: field_type.abi_name(),
            actual: value_type.abi_name(),
        });
    }

    let args = DynSolType::Tuple(vec![DynSolType::FixedBytes(4), field_type.sol_type()])
        .abi_decode_params(body)
        .map_err(abi_error)?;
    let value = match args {
        DynSolValue::Tuple(mut parts) if parts.len() == 2 => parts.pop(),
        _ => None,
    }
    .ok_or_else(|| CodecError::Abi("malformed setter arguments".to_string()))?;

    let mut patch = RecordPatch::new(layout.clone());
    patch.set_at(index, value)?;
    Ok(RecordCall::Write(patch))
}
