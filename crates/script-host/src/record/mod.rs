//! Structured records exchanged between the host and scripts.
//!
//! A [`RecordLayout`] fixes the names, types and order of the fields. A [`Record`] is one
//! instance of a layout, and a [`RecordPatch`] is a partial instance used for field-by-field
//! writes. Host types opt in through [`ScriptRecord`], usually via
//! [`script_record!`](crate::script_record).

mod field;
mod layout;
mod patch;
mod value;

pub use field::*;
pub use layout::{FieldDef, FieldType, RecordLayout, MAX_RECORD_FIELDS, RESERVED_FIELD_NAMES};
pub(crate) use layout::{selector_of, type_mismatch};
pub use patch::*;
pub use value::*;
