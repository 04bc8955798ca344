//! Error types for the script host.

use alloy_primitives::{Address, Selector, U256};

/// Errors raised while encoding or decoding structured records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The calldata was encoded for a different record layout (renamed or reordered fields).
    #[error("record layout mismatch: expected selector {expected}, got {actual}")]
    LayoutMismatch {
        /// The selector of the local layout
        expected: Selector,
        /// The selector found in the payload
        actual: Selector,
    },
    /// The payload is shorter than a selector.
    #[error("calldata too short: {len} bytes")]
    ShortCalldata {
        /// The length of the payload
        len: usize,
    },
    /// The ABI body could not be decoded.
    #[error("ABI decoding failed: {0}")]
    Abi(String),
    /// An unsigned integer does not fit into the declared width.
    #[error("value of {bits} bits does not fit in uint{width}")]
    ValueOutOfRange {
        /// The declared width in bits
        width: usize,
        /// The number of significant bits of the value
        bits: usize,
    },
    /// A negative value was given for an unsigned field.
    #[error("negative value for unsigned field uint{width}")]
    NegativeUnsigned {
        /// The declared width in bits
        width: usize,
    },
    /// An address was not exactly 20 bytes long.
    #[error("address must be 20 bytes, got {len}")]
    InvalidAddressLength {
        /// The length of the provided bytes
        len: usize,
    },
    /// A value does not have the type declared by the layout.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The declared type
        expected: String,
        /// The provided type
        actual: String,
    },
    /// The number of values does not match the number of fields of the record.
    #[error("record {record} has {expected} fields, got {actual}")]
    FieldCount {
        /// The record name
        record: String,
        /// The number of declared fields
        expected: usize,
        /// The number of provided values
        actual: usize,
    },
    /// The record has no field with the given name.
    #[error("unknown field `{field}` in record {record}")]
    UnknownField {
        /// The record name
        record: String,
        /// The requested field
        field: String,
    },
    /// The calldata selector is not understood by the record precompile.
    #[error("unknown selector {0}")]
    UnknownSelector(Selector),
    /// A write was attempted against a decode-only record.
    #[error("record {0} is read-only")]
    ReadOnlyRecord(String),
    /// A patch presence mask references positions past the end of the record.
    #[error("patch mask {mask:#x} references fields beyond {fields}")]
    InvalidPatchMask {
        /// The presence mask
        mask: U256,
        /// The number of fields of the record
        fields: usize,
    },
    /// The layout definition itself is invalid.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    /// A field holds a well-typed but semantically invalid value.
    #[error("invalid value for field `{field}`: {reason}")]
    InvalidValue {
        /// The field name
        field: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Which half of a `(source unit, entry)` pair failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Unresolved {
    /// The source unit does not exist
    #[display("source unit")]
    SourceUnit,
    /// The source unit exists but has no such entry
    #[display("entry")]
    Entry,
}

/// Errors surfaced by the script host and the orchestration session.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A precompile is already installed at the address.
    #[error("address {address} already has a precompile installed")]
    AddressCollision {
        /// The occupied address
        address: Address,
    },
    /// The script could not be resolved.
    #[error("script {source_unit}:{entry} not found: unknown {missing}")]
    UnresolvedScript {
        /// The requested source unit
        source_unit: String,
        /// The requested entry
        entry: String,
        /// Which part failed to resolve
        missing: Unresolved,
    },
    /// The symbol referenced by a label does not exist.
    #[error("label symbol {source_unit}:{symbol} not found")]
    UnresolvedLabelSymbol {
        /// The requested source unit
        source_unit: String,
        /// The requested symbol
        symbol: String,
    },
    /// The input record holds a value that cannot cross the boundary.
    #[error("malformed input record: {0}")]
    MalformedInputRecord(#[source] CodecError),
    /// The harvested output record cannot be converted back into the host type.
    #[error("malformed output record: {0}")]
    MalformedOutputRecord(#[source] CodecError),
    /// The script ran and signaled failure.
    #[error("script {script} failed: {reason}")]
    ScriptExecutionFailed {
        /// The entry that failed
        script: String,
        /// The revert reason
        reason: String,
    },
    /// The script was invoked with the wrong number of arguments.
    #[error("script {script} expects {expected} arguments, got {actual}")]
    WrongArity {
        /// The invoked entry
        script: String,
        /// The declared number of parameters
        expected: usize,
        /// The number of arguments given
        actual: usize,
    },
    /// An argument does not match the declared parameter type.
    #[error("argument {index} of script {script} must be {expected}")]
    InvalidArgument {
        /// The invoked entry
        script: String,
        /// The position of the argument
        index: usize,
        /// The declared parameter type
        expected: String,
    },
    /// A cleanup action failed.
    #[error("teardown `{action}` failed: {source}")]
    TeardownFailure {
        /// The description of the action
        action: String,
        /// The underlying failure
        source: Box<ScriptError>,
    },
    /// The output validation hook rejected the harvested record.
    #[error("output validation failed: {0}")]
    OutputValidation(String),
    /// Any other failure reported by the host.
    #[error("host error: {0}")]
    Host(String),
}
