use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};

use super::{layout::type_mismatch, FieldType, Record, RecordLayout};
use crate::CodecError;

/// A host-native type that can be stored in a record field.
pub trait RecordField: Sized {
    /// The semantic type of the field.
    fn field_type() -> FieldType;

    /// Converts the value into its canonical ABI value.
    fn to_sol_value(&self) -> DynSolValue;

    /// Converts an ABI value back, checking width and type.
    fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError>;
}

/// A host-native structured record with a fixed layout.
///
/// Implementations are normally generated by [`script_record!`](crate::script_record).
pub trait ScriptRecord: Sized {
    /// The layout shared by every instance.
    fn layout() -> Arc<RecordLayout>;

    /// Converts the value into a dynamic record.
    fn to_record(&self) -> Record;

    /// Converts a dynamic record back into the host type.
    fn from_record(record: Record) -> Result<Self, CodecError>;
}

macro_rules! impl_uint_field {
    ($($ty:ty => $bits:literal),* $(,)?) => {$(
        impl RecordField for $ty {
            fn field_type() -> FieldType {
                FieldType::Uint($bits)
            }

            fn to_sol_value(&self) -> DynSolValue {
                DynSolValue::Uint(U256::from(*self), $bits)
            }

            fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError> {
                match Self::field_type().coerce(value)? {
                    DynSolValue::Uint(value, _) => Ok(value.saturating_to::<$ty>()),
                    other => Err(type_mismatch(&Self::field_type(), &other)),
                }
            }
        }
    )*};
}

impl_uint_field!(u8 => 8, u16 => 16, u32 => 32, u64 => 64, u128 => 128);

impl RecordField for U256 {
    fn field_type() -> FieldType {
        FieldType::Uint(256)
    }

    fn to_sol_value(&self) -> DynSolValue {
        DynSolValue::Uint(*self, 256)
    }

    fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError> {
        match Self::field_type().coerce(value)? {
            DynSolValue::Uint(value, _) => Ok(value),
            other => Err(type_mismatch(&Self::field_type(), &other)),
        }
    }
}

impl RecordField for Address {
    fn field_type() -> FieldType {
        FieldType::Address
    }

    fn to_sol_value(&self) -> DynSolValue {
        DynSolValue::Address(*self)
    }

    fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError> {
        match Self::field_type().coerce(value)? {
            DynSolValue::Address(address) => Ok(address),
            other => Err(type_mismatch(&Self::field_type(), &other)),
        }
    }
}

impl RecordField for bool {
    fn field_type() -> FieldType {
        FieldType::Bool
    }

    fn to_sol_value(&self) -> DynSolValue {
        DynSolValue::Bool(*self)
    }

    fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError> {
        match Self::field_type().coerce(value)? {
            DynSolValue::Bool(value) => Ok(value),
            other => Err(type_mismatch(&Self::field_type(), &other)),
        }
    }
}

impl RecordField for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn to_sol_value(&self) -> DynSolValue {
        DynSolValue::String(self.clone())
    }

    fn from_sol_value(value: DynSolValue) -> Result<Self, CodecError> {
        match Self::field_type().coerce(value)? {
            DynSolValue::String(value) => Ok(value),
            other => Err(type_mismatch(&Self::field_type(), &other)),
        }
    }
}

/// Declares a struct together with its [`ScriptRecord`] and [`RecordField`] implementations.
///
/// Each field maps a Rust name to the name scripts use for it. The declaration order is the wire
/// order.
///
/// ```rust,ignore
/// script_record! {
///     #[derive(Debug, Clone, Default, PartialEq, Eq)]
///     pub struct Input as "Input" {
///         pub delay: U256 => "delaySeconds",
///         pub owner: Address => "owner",
///     }
/// }
/// ```
#[macro_export]
macro_rules! script_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $abi_name:literal {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $abi_field:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::ScriptRecord for $name {
            fn layout() -> $crate::__private::Arc<$crate::RecordLayout> {
                static LAYOUT: $crate::__private::OnceCell<
                    $crate::__private::Arc<$crate::RecordLayout>,
                > = $crate::__private::OnceCell::new();
                LAYOUT
                    .get_or_init(|| {
                        $crate::RecordLayout::new(
                            $abi_name,
                            ::std::vec![$(
                                $crate::FieldDef::new(
                                    $abi_field,
                                    <$ty as $crate::RecordField>::field_type(),
                                )
                            ),*],
                        )
                    })
                    .clone()
            }

            fn to_record(&self) -> $crate::Record {
                $crate::Record::from_trusted(
                    <Self as $crate::ScriptRecord>::layout(),
                    ::std::vec![$($crate::RecordField::to_sol_value(&self.$field)),*],
                )
            }

            #[allow(unused_mut, unused_variables)]
            fn from_record(
                record: $crate::Record,
            ) -> ::core::result::Result<Self, $crate::CodecError> {
                let layout = <Self as $crate::ScriptRecord>::layout();
                let record = record.expect_layout(&layout)?;
                let expected = layout.len();
                let mut values = record.into_values().into_iter();
                ::core::result::Result::Ok(Self {
                    $(
                        $field: $crate::RecordField::from_sol_value(values.next().ok_or_else(
                            || $crate::CodecError::FieldCount {
                                record: $abi_name.to_string(),
                                expected,
                                actual: 0,
                            },
                        )?)?,
                    )*
                })
            }
        }

        impl $crate::RecordField for $name {
            fn field_type() -> $crate::FieldType {
                $crate::FieldType::Record(<Self as $crate::ScriptRecord>::layout())
            }

            fn to_sol_value(&self) -> $crate::__private::DynSolValue {
                $crate::ScriptRecord::to_record(self).to_sol_value()
            }

            fn from_sol_value(
                value: $crate::__private::DynSolValue,
            ) -> ::core::result::Result<Self, $crate::CodecError> {
                let layout = <Self as $crate::ScriptRecord>::layout();
                match <Self as $crate::RecordField>::field_type().coerce(value)? {
                    $crate::__private::DynSolValue::Tuple(values) => {
                        <Self as $crate::ScriptRecord>::from_record(
                            $crate::Record::from_trusted(layout, values),
                        )
                    }
                    _ => ::core::result::Result::Err($crate::CodecError::TypeMismatch {
                        expected: $abi_name.to_string(),
                        actual: "non-tuple".to_string(),
                    }),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    crate::script_record! {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        struct Inner as "Inner" {
            owner: Address => "owner",
            enabled: bool => "enabled",
        }
    }

    crate::script_record! {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        struct Outer as "Outer" {
            delay: u64 => "delaySeconds",
            total: U256 => "total",
            release: String => "release",
            inner: Inner => "inner",
        }
    }

    fn outer() -> Outer {
        Outer {
            delay: 604_800,
            total: U256::from(10).pow(U256::from(30)),
            release: "op-contracts/v2.0.0".to_string(),
            inner: Inner {
                owner: address!("0x2222222222222222222222222222222222222222"),
                enabled: true,
            },
        }
    }

    #[test]
    fn test_layout_from_macro() {
        let layout = Outer::layout();
        assert_eq!(
            layout.signature(),
            "Outer(uint64 delaySeconds,uint256 total,string release,Inner(address owner,bool enabled) inner)"
        );
        assert!(Arc::ptr_eq(&layout, &Outer::layout()));
    }

    #[test]
    fn test_typed_round_trip_through_record() {
        let value = outer();
        let record = value.to_record();
        assert_eq!(record.get("delaySeconds"), Some(&DynSolValue::Uint(U256::from(604_800), 64)));
        assert_eq!(Outer::from_record(record).unwrap(), value);
    }

    #[test]
    fn test_zero_record_is_default() {
        let record = Record::zero(Outer::layout());
        assert_eq!(Outer::from_record(record).unwrap(), Outer::default());
    }

    #[test]
    fn test_from_record_rejects_other_layout() {
        let record = Record::zero(Inner::layout());
        assert!(matches!(Outer::from_record(record), Err(CodecError::LayoutMismatch { .. })));
    }

    #[test]
    fn test_narrow_uint_rejects_overflow() {
        let err = u8::from_sol_value(DynSolValue::Uint(U256::from(300), 256)).unwrap_err();
        assert_eq!(err, CodecError::ValueOutOfRange { width: 8, bits: 9 });
        assert_eq!(u8::from_sol_value(DynSolValue::Uint(U256::from(255), 256)).unwrap(), 255);
    }
}
