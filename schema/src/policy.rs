//! Per-field codec strategies.
//!
//! Emitters switch on these tags to pick how a member is packed, reset and
//! tested for emptiness; the IR never carries template text.

use serde::Serialize;

use crate::field::FieldType;
use crate::primitive::{PrimitiveType, SizePrefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PackStrategy {
    /// Plain scalar, byte order converted on the wire.
    Scalar,
    /// Enum converted through its underlying integer; out-of-range values decode to the sentinel.
    EnumCast,
    /// Bitfield stored as its raw underlying integer.
    BitfieldRaw,
    /// Fixed-length array copied verbatim.
    ArrayCopy,
    /// Variable-length array written after the static block behind a length prefix.
    LengthPrefixed(SizePrefix),
    /// Several slots shifted and masked into one shared integer.
    SqueezeShift,
    String,
    Bytes,
    /// JSON document carried as a string.
    JsonText,
    Vector,
    /// Nested table serialized into an opaque size-prefixed blob.
    NestedTable,
    /// Externally defined serializable type, carried as a blob.
    CustomSerializable,
    /// Encoding supplied by user code (`virtual` fields).
    Deferred,
    SqlInteger,
    /// Bool persisted as a `uint8_t` integer column.
    SqlBool,
    SqlBlob,
    SqlText,
    SqlEnum,
    /// Row id column; `-1` in memory maps to SQL `NULL`.
    SqlForeignId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefaultValue {
    Zero,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetPolicy {
    Assign(DefaultValue),
    Clear,
    /// Forget the referenced row: id back to `-1`, loaded row dropped.
    Unlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmptyCheck {
    EqualsDefault,
    IsEmpty,
    NullRowId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValuePolicy {
    pub pack:  PackStrategy,
    pub reset: ResetPolicy,
    pub empty: EmptyCheck,
}

impl ValuePolicy {
    fn scalar(pack: PackStrategy, ty: Option<PrimitiveType>) -> ValuePolicy {
        let default = match ty {
            Some(PrimitiveType::Bool) => DefaultValue::False,
            _ => DefaultValue::Zero,
        };
        ValuePolicy {
            pack,
            reset: ResetPolicy::Assign(default),
            empty: EmptyCheck::EqualsDefault,
        }
    }

    fn container(pack: PackStrategy) -> ValuePolicy {
        ValuePolicy {
            pack,
            reset: ResetPolicy::Clear,
            empty: EmptyCheck::IsEmpty,
        }
    }

    /// Policy for a member of a protocol message or a table.
    pub fn encoded(ty: &FieldType, is_virtual: bool) -> ValuePolicy {
        let mut policy = match ty {
            FieldType::Primitive(p) => Self::scalar(PackStrategy::Scalar, Some(*p)),
            FieldType::Enum(_) => Self::scalar(PackStrategy::EnumCast, None),
            FieldType::Bitfield(_) => Self::scalar(PackStrategy::BitfieldRaw, None),
            FieldType::Squeeze { .. } => Self::scalar(PackStrategy::SqueezeShift, None),
            FieldType::FixedArray { .. } => Self::scalar(PackStrategy::ArrayCopy, None),
            FieldType::VariableArray { prefix, .. } => {
                Self::container(PackStrategy::LengthPrefixed(*prefix))
            }
            FieldType::Text => Self::container(PackStrategy::String),
            FieldType::Bytes => Self::container(PackStrategy::Bytes),
            FieldType::Json => Self::container(PackStrategy::JsonText),
            FieldType::Vector(_) => Self::container(PackStrategy::Vector),
            FieldType::Embedded(_) => Self::container(PackStrategy::NestedTable),
            FieldType::Custom(_) => Self::container(PackStrategy::CustomSerializable),
            FieldType::ForeignKey(_) => Self::sql(ty),
        };
        if is_virtual {
            policy.pack = PackStrategy::Deferred;
        }
        policy
    }

    /// Policy for a column of an SQL-backed record.
    pub fn sql(ty: &FieldType) -> ValuePolicy {
        match ty {
            FieldType::Primitive(PrimitiveType::Bool) => {
                Self::scalar(PackStrategy::SqlBool, Some(PrimitiveType::Bool))
            }
            FieldType::Primitive(p) => Self::scalar(PackStrategy::SqlInteger, Some(*p)),
            FieldType::Enum(_) => Self::scalar(PackStrategy::SqlEnum, None),
            FieldType::Bitfield(_) => Self::scalar(PackStrategy::SqlInteger, None),
            FieldType::Text | FieldType::Json => Self::container(PackStrategy::SqlText),
            FieldType::ForeignKey(_) => ValuePolicy {
                pack:  PackStrategy::SqlForeignId,
                reset: ResetPolicy::Unlink,
                empty: EmptyCheck::NullRowId,
            },
            _ => Self::container(PackStrategy::SqlBlob),
        }
    }
}
