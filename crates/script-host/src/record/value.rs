use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;

use super::{RecordLayout, RecordPatch};
use crate::CodecError;

/// An instance of a [`RecordLayout`]: one canonical value per field, in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    layout: Arc<RecordLayout>,
    values: Vec<DynSolValue>,
}

impl Record {
    /// Creates a record with every field at its zero value.
    pub fn zero(layout: Arc<RecordLayout>) -> Self {
        let values = layout.zero_values();
        Self { layout, values }
    }

    /// Creates a record from positional values, coercing each to its declared type.
    pub fn from_values(
        layout: Arc<RecordLayout>,
        values: Vec<DynSolValue>,
    ) -> Result<Self, CodecError> {
        let values = layout.coerce_values(values)?;
        Ok(Self { layout, values })
    }

    /// Creates a record from values that are already canonical for `layout`.
    #[doc(hidden)]
    pub fn from_trusted(layout: Arc<RecordLayout>, values: Vec<DynSolValue>) -> Self {
        debug_assert_eq!(layout.len(), values.len(), "value count must match {}", layout.name());
        Self { layout, values }
    }

    /// Returns `self` if it was built for `layout`, a [`CodecError::LayoutMismatch`] otherwise.
    pub fn expect_layout(self, layout: &RecordLayout) -> Result<Self, CodecError> {
        if self.layout.selector() != layout.selector() {
            return Err(CodecError::LayoutMismatch {
                expected: layout.selector(),
                actual: self.layout.selector(),
            });
        }
        Ok(self)
    }

    /// The layout of the record.
    pub const fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// The field values, in layout order.
    pub fn values(&self) -> &[DynSolValue] {
        &self.values
    }

    /// Consumes the record and returns its values.
    pub fn into_values(self) -> Vec<DynSolValue> {
        self.values
    }

    /// The value at `index`.
    pub fn value(&self, index: usize) -> Option<&DynSolValue> {
        self.values.get(index)
    }

    /// The value of the field called `name`.
    pub fn get(&self, name: &str) -> Option<&DynSolValue> {
        self.layout.position(name).and_then(|index| self.values.get(index))
    }

    /// Sets a single field.
    pub fn set(&mut self, name: &str, value: DynSolValue) -> Result<(), CodecError> {
        let index = self.layout.require_position(name)?;
        self.values[index] = self.layout.fields()[index].ty().coerce(value)?;
        Ok(())
    }

    /// Applies a patch field-by-field. Fields absent from the patch keep their current value.
    pub fn apply(&mut self, patch: &RecordPatch) -> Result<(), CodecError> {
        if patch.layout().selector() != self.layout.selector() {
            return Err(CodecError::LayoutMismatch {
                expected: self.layout.selector(),
                actual: patch.layout().selector(),
            });
        }
        for (index, value) in patch.iter() {
            self.values[index] = value.clone();
        }
        Ok(())
    }

    /// The record as an ABI tuple.
    pub fn to_sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(self.values.clone())
    }

    /// Whether every field is at its zero value.
    pub fn is_zero(&self) -> bool {
        self.values == self.layout.zero_values()
    }
}
