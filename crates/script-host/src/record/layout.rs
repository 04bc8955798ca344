use std::{collections::HashSet, sync::Arc};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Address, Selector, U256};

use crate::CodecError;

/// Maximum number of fields a record may declare. Bounded by the width of the patch presence
/// mask.
pub const MAX_RECORD_FIELDS: usize = 256;

/// Names of the methods every record precompile answers besides the field getters.
pub const RESERVED_FIELD_NAMES: &[&str] = &["snapshot"];

/// Computes the 4-byte selector of a signature.
pub(crate) fn selector_of(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// The semantic type of a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned integer of the given width in bits.
    Uint(usize),
    /// 20-byte address.
    Address,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Nested record.
    Record(Arc<RecordLayout>),
}

impl FieldType {
    /// Returns the ABI type used on the wire.
    pub fn sol_type(&self) -> DynSolType {
        match self {
            Self::Uint(bits) => DynSolType::Uint(*bits),
            Self::Address => DynSolType::Address,
            Self::Bool => DynSolType::Bool,
            Self::String => DynSolType::String,
            Self::Record(layout) => layout.tuple_type(),
        }
    }

    /// Returns the ABI type name, e.g. `uint256` or `(address,bool)`.
    pub fn abi_name(&self) -> String {
        match self {
            Self::Uint(bits) => format!("uint{bits}"),
            Self::Address => "address".to_string(),
            Self::Bool => "bool".to_string(),
            Self::String => "string".to_string(),
            Self::Record(layout) => layout.tuple_type().sol_type_name().into_owned(),
        }
    }

    /// Returns the type as it appears inside a canonical record signature. Nested records carry
    /// their own names so that a renamed inner field changes the outer selector too.
    pub fn canonical_name(&self) -> String {
        match self {
            Self::Record(layout) => layout.signature().to_string(),
            other => other.abi_name(),
        }
    }

    /// Returns the zero value of the type.
    pub fn zero_value(&self) -> DynSolValue {
        match self {
            Self::Uint(bits) => DynSolValue::Uint(U256::ZERO, *bits),
            Self::Address => DynSolValue::Address(Address::ZERO),
            Self::Bool => DynSolValue::Bool(false),
            Self::String => DynSolValue::String(String::new()),
            Self::Record(layout) => DynSolValue::Tuple(layout.zero_values()),
        }
    }

    /// Converts `value` into the canonical representation of this type.
    ///
    /// Integers must fit the declared width, negative integers are rejected for unsigned fields
    /// and addresses must be exactly 20 bytes.
    pub fn coerce(&self, value: DynSolValue) -> Result<DynSolValue, CodecError> {
        match (self, value) {
            (Self::Uint(width), DynSolValue::Uint(value, _)) => {
                check_width(*width, value).map(|value| DynSolValue::Uint(value, *width))
            }
            (Self::Uint(width), DynSolValue::Int(value, _)) => {
                if value.is_negative() {
                    return Err(CodecError::NegativeUnsigned { width: *width });
                }
                check_width(*width, value.into_raw()).map(|value| DynSolValue::Uint(value, *width))
            }
            (Self::Address, DynSolValue::Address(address)) => Ok(DynSolValue::Address(address)),
            (Self::Address, DynSolValue::Bytes(bytes)) => address_from_slice(&bytes),
            (Self::Address, DynSolValue::FixedBytes(word, len)) => {
                address_from_slice(&word[..len.min(32)])
            }
            (Self::Bool, DynSolValue::Bool(value)) => Ok(DynSolValue::Bool(value)),
            (Self::String, DynSolValue::String(value)) => Ok(DynSolValue::String(value)),
            (Self::Record(layout), DynSolValue::Tuple(values)) => {
                layout.coerce_values(values).map(DynSolValue::Tuple)
            }
            (expected, value) => Err(type_mismatch(expected, &value)),
        }
    }
}

fn check_width(width: usize, value: U256) -> Result<U256, CodecError> {
    let bits = value.bit_len();
    if bits > width {
        return Err(CodecError::ValueOutOfRange { width, bits });
    }
    Ok(value)
}

fn address_from_slice(bytes: &[u8]) -> Result<DynSolValue, CodecError> {
    if bytes.len() != 20 {
        return Err(CodecError::InvalidAddressLength { len: bytes.len() });
    }
    Ok(DynSolValue::Address(Address::from_slice(bytes)))
}

/// Builds a [`CodecError::TypeMismatch`] for `value`.
pub(crate) fn type_mismatch(expected: &FieldType, value: &DynSolValue) -> CodecError {
    CodecError::TypeMismatch {
        expected: expected.abi_name(),
        actual: value
            .sol_type_name()
            .map(|name| name.into_owned())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// A named field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    ty: FieldType,
    getter: Selector,
}

impl FieldDef {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        let getter = selector_of(&format!("{name}()"));
        Self { name, ty, getter }
    }

    /// The field name as seen by scripts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field type.
    pub const fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Selector of the `<name>()` getter.
    pub const fn getter(&self) -> Selector {
        self.getter
    }
}

/// The fixed layout of a structured record: its name and the ordered list of fields.
///
/// Layouts are immutable once built and are shared through [`Arc`]. The canonical signature,
/// e.g. `Input(uint256 delay,bool useInterop)`, covers names, types and order, so any change in
/// the declaration changes [`RecordLayout::selector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    name: String,
    fields: Vec<FieldDef>,
    signature: String,
    selector: Selector,
    patch_selector: Selector,
}

impl RecordLayout {
    /// Creates a layout without validating it. Use [`RecordLayout::try_new`] for layouts built
    /// from untrusted descriptions.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Arc<Self> {
        let name = name.into();
        let signature = format!(
            "{name}({})",
            fields
                .iter()
                .map(|field| format!("{} {}", field.ty.canonical_name(), field.name))
                .collect::<Vec<_>>()
                .join(",")
        );
        let selector = selector_of(&signature);
        let patch_selector = selector_of(&format!("patch({signature})"));
        Arc::new(Self { name, fields, signature, selector, patch_selector })
    }

    /// Creates a layout after checking field names, integer widths and the field count. Fields
    /// whose getter would shadow a [`RESERVED_FIELD_NAMES`] method are rejected.
    pub fn try_new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Arc<Self>, CodecError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CodecError::InvalidLayout("record name is empty".to_string()));
        }
        if fields.len() > MAX_RECORD_FIELDS {
            return Err(CodecError::InvalidLayout(format!(
                "{name} declares {} fields, at most {MAX_RECORD_FIELDS} are supported",
                fields.len()
            )));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(CodecError::InvalidLayout(format!("{name} has an unnamed field")));
            }
            if RESERVED_FIELD_NAMES
                .iter()
                .any(|reserved| selector_of(&format!("{reserved}()")) == field.getter)
            {
                return Err(CodecError::InvalidLayout(format!(
                    "{name}.{} collides with a reserved precompile method",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CodecError::InvalidLayout(format!(
                    "{name} declares `{}` twice",
                    field.name
                )));
            }
            if let FieldType::Uint(bits) = field.ty {
                if bits == 0 || bits > 256 || bits % 8 != 0 {
                    return Err(CodecError::InvalidLayout(format!(
                        "{name}.{} has invalid width uint{bits}",
                        field.name
                    )));
                }
            }
        }
        Ok(Self::new(name, fields))
    }

    /// The record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered fields.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field at `index`.
    pub fn field(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    /// Position of the field called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Position of the field whose getter selector is `selector`.
    pub fn position_of_getter(&self, selector: Selector) -> Option<usize> {
        self.fields.iter().position(|field| field.getter == selector)
    }

    /// The canonical signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Selector prefixed to full record encodings.
    pub const fn selector(&self) -> Selector {
        self.selector
    }

    /// Selector prefixed to patch encodings.
    pub const fn patch_selector(&self) -> Selector {
        self.patch_selector
    }

    /// The ABI tuple type of the record body.
    pub fn tuple_type(&self) -> DynSolType {
        DynSolType::Tuple(self.fields.iter().map(|field| field.ty.sol_type()).collect())
    }

    /// Zero values of every field, in order.
    pub fn zero_values(&self) -> Vec<DynSolValue> {
        self.fields.iter().map(|field| field.ty.zero_value()).collect()
    }

    pub(crate) fn require_position(&self, name: &str) -> Result<usize, CodecError> {
        self.position(name).ok_or_else(|| CodecError::UnknownField {
            record: self.name.clone(),
            field: name.to_string(),
        })
    }

    pub(crate) fn coerce_values(
        &self,
        values: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, CodecError> {
        if values.len() != self.fields.len() {
            return Err(CodecError::FieldCount {
                record: self.name.clone(),
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        self.fields.iter().zip(values).map(|(field, value)| field.ty.coerce(value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, I256};

    fn layout() -> Arc<RecordLayout> {
        RecordLayout::new(
            "Input",
            vec![
                FieldDef::new("delay", FieldType::Uint(64)),
                FieldDef::new("owner", FieldType::Address),
                FieldDef::new("useInterop", FieldType::Bool),
            ],
        )
    }

    #[test]
    fn test_signature_covers_names_and_order() {
        let layout = layout();
        assert_eq!(layout.signature(), "Input(uint64 delay,address owner,bool useInterop)");

        let reordered = RecordLayout::new(
            "Input",
            vec![
                FieldDef::new("owner", FieldType::Address),
                FieldDef::new("delay", FieldType::Uint(64)),
                FieldDef::new("useInterop", FieldType::Bool),
            ],
        );
        assert_ne!(layout.selector(), reordered.selector());
        assert_ne!(layout.patch_selector(), layout.selector());
    }

    #[test]
    fn test_nested_signature() {
        let inner = RecordLayout::new("Inner", vec![FieldDef::new("a", FieldType::Address)]);
        let outer = RecordLayout::new(
            "Outer",
            vec![
                FieldDef::new("x", FieldType::Uint(256)),
                FieldDef::new("inner", FieldType::Record(inner)),
            ],
        );
        assert_eq!(outer.signature(), "Outer(uint256 x,Inner(address a) inner)");
        assert_eq!(outer.field(1).unwrap().ty().abi_name(), "(address)");
    }

    #[test]
    fn test_getter_selector() {
        let layout = layout();
        let expected = selector_of("delay()");
        assert_eq!(layout.position_of_getter(expected), Some(0));
        assert_eq!(layout.position("useInterop"), Some(2));
        assert_eq!(layout.position("missing"), None);
    }

    #[test]
    fn test_coerce_uint_width() {
        let ty = FieldType::Uint(64);
        assert_eq!(
            ty.coerce(DynSolValue::Uint(U256::from(u64::MAX), 256)).unwrap(),
            DynSolValue::Uint(U256::from(u64::MAX), 64)
        );
        assert_eq!(
            ty.coerce(DynSolValue::Uint(U256::from(u64::MAX) + U256::from(1), 256)),
            Err(CodecError::ValueOutOfRange { width: 64, bits: 65 })
        );
    }

    #[test]
    fn test_coerce_negative_into_unsigned() {
        let ty = FieldType::Uint(256);
        assert_eq!(
            ty.coerce(DynSolValue::Int(I256::MINUS_ONE, 256)),
            Err(CodecError::NegativeUnsigned { width: 256 })
        );
        assert_eq!(
            ty.coerce(DynSolValue::Int(I256::from_raw(U256::from(7)), 256)).unwrap(),
            DynSolValue::Uint(U256::from(7), 256)
        );
    }

    #[test]
    fn test_coerce_address_length() {
        let ty = FieldType::Address;
        let owner = address!("0x1111111111111111111111111111111111111111");
        assert_eq!(
            ty.coerce(DynSolValue::Bytes(owner.to_vec())).unwrap(),
            DynSolValue::Address(owner)
        );
        assert_eq!(
            ty.coerce(DynSolValue::Bytes(vec![0x11; 19])),
            Err(CodecError::InvalidAddressLength { len: 19 })
        );
        assert_eq!(
            ty.coerce(DynSolValue::Bytes(vec![0x11; 21])),
            Err(CodecError::InvalidAddressLength { len: 21 })
        );
    }

    #[test]
    fn test_coerce_type_mismatch() {
        let err = FieldType::Bool.coerce(DynSolValue::String("true".into())).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_try_new_rejects_invalid_layouts() {
        let duplicate = RecordLayout::try_new(
            "Dup",
            vec![FieldDef::new("a", FieldType::Bool), FieldDef::new("a", FieldType::Bool)],
        );
        assert!(matches!(duplicate, Err(CodecError::InvalidLayout(_))));

        let width = RecordLayout::try_new("Width", vec![FieldDef::new("a", FieldType::Uint(7))]);
        assert!(matches!(width, Err(CodecError::InvalidLayout(_))));

        assert!(RecordLayout::try_new("Ok", vec![FieldDef::new("a", FieldType::Uint(8))]).is_ok());
    }

    #[test]
    fn test_try_new_rejects_reserved_names() {
        let reserved = RecordLayout::try_new(
            "Output",
            vec![FieldDef::new("opcm", FieldType::Address), FieldDef::new("snapshot", FieldType::Bool)],
        );
        assert!(
            matches!(reserved, Err(CodecError::InvalidLayout(ref reason)) if reason.contains("Output.snapshot"))
        );

        let prefixed = RecordLayout::try_new("Output", vec![FieldDef::new("snapshotId", FieldType::Bool)]);
        assert!(prefixed.is_ok());
    }
}
