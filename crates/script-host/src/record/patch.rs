use std::{collections::BTreeMap, sync::Arc};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;

use super::{Record, RecordLayout};
use crate::CodecError;

/// A partial record: a subset of positions of a [`RecordLayout`] with their new values.
///
/// Patches are what a script sends to an output precompile. Applying several patches that touch
/// disjoint fields yields the same record as applying their union.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    layout: Arc<RecordLayout>,
    fields: BTreeMap<usize, DynSolValue>,
}

impl RecordPatch {
    /// Creates an empty patch.
    pub const fn new(layout: Arc<RecordLayout>) -> Self {
        Self { layout, fields: BTreeMap::new() }
    }

    /// Creates a patch setting every field of `record`.
    pub fn from_record(record: &Record) -> Self {
        Self {
            layout: record.layout().clone(),
            fields: record.values().iter().cloned().enumerate().collect(),
        }
    }

    /// The layout the patch applies to.
    pub const fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Sets the field called `name`.
    pub fn set(&mut self, name: &str, value: DynSolValue) -> Result<(), CodecError> {
        let index = self.layout.require_position(name)?;
        self.set_at(index, value)
    }

    /// Sets the field at `index`.
    pub fn set_at(&mut self, index: usize, value: DynSolValue) -> Result<(), CodecError> {
        let field = self.layout.field(index).ok_or_else(|| CodecError::UnknownField {
            record: self.layout.name().to_string(),
            field: format!("#{index}"),
        })?;
        let value = field.ty().coerce(value)?;
        self.fields.insert(index, value);
        Ok(())
    }

    /// Builder-style [`RecordPatch::set`].
    pub fn with(mut self, name: &str, value: DynSolValue) -> Result<Self, CodecError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// The value set for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&DynSolValue> {
        self.layout.position(name).and_then(|index| self.fields.get(&index))
    }

    /// Number of fields set.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(position, value)` pairs in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DynSolValue)> {
        self.fields.iter().map(|(index, value)| (*index, value))
    }

    /// The presence mask: bit `i` is set when position `i` is part of the patch.
    pub fn mask(&self) -> U256 {
        self.fields.keys().fold(U256::ZERO, |mask, index| mask | (U256::from(1u8) << *index))
    }

    /// Merges `other` into `self`; values of `other` win on overlap.
    pub fn merge(&mut self, other: &Self) -> Result<(), CodecError> {
        if other.layout.selector() != self.layout.selector() {
            return Err(CodecError::LayoutMismatch {
                expected: self.layout.selector(),
                actual: other.layout.selector(),
            });
        }
        self.fields.extend(other.fields.iter().map(|(index, value)| (*index, value.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, FieldType};

    fn layout() -> Arc<RecordLayout> {
        RecordLayout::new(
            "Flags",
            vec![
                FieldDef::new("a", FieldType::Bool),
                FieldDef::new("b", FieldType::Bool),
                FieldDef::new("c", FieldType::Uint(8)),
            ],
        )
    }

    #[test]
    fn test_mask() {
        let patch = RecordPatch::new(layout())
            .with("a", DynSolValue::Bool(true))
            .unwrap()
            .with("c", DynSolValue::Uint(U256::from(3), 8))
            .unwrap();
        assert_eq!(patch.mask(), U256::from(0b101));
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn test_set_coerces() {
        let mut patch = RecordPatch::new(layout());
        let err = patch.set("c", DynSolValue::Uint(U256::from(256), 256)).unwrap_err();
        assert_eq!(err, CodecError::ValueOutOfRange { width: 8, bits: 9 });
        assert!(patch.is_empty());
    }

    #[test]
    fn test_merge() {
        let mut left = RecordPatch::new(layout()).with("a", DynSolValue::Bool(true)).unwrap();
        let right = RecordPatch::new(layout())
            .with("a", DynSolValue::Bool(false))
            .unwrap()
            .with("b", DynSolValue::Bool(true))
            .unwrap();
        left.merge(&right).unwrap();
        assert_eq!(left.get("a"), Some(&DynSolValue::Bool(false)));
        assert_eq!(left.get("b"), Some(&DynSolValue::Bool(true)));
        assert_eq!(left.get("c"), None);
    }
}
