use serde::Serialize;

use crate::definition::DefId;
use crate::policy::ValuePolicy;
use crate::primitive::{PrimitiveType, SizePrefix};

/// Row id stored for a foreign key that points nowhere.
pub const NULL_ROW_ID: i64 = -1;

/// Reference from a field to another definition held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    pub id:      DefId,
    pub name:    String,
    /// Integer the referenced enum or bitfield is stored as; `None` for tables and records.
    pub storage: Option<PrimitiveType>,
}

/// One named run of bits inside a shared integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitSlot {
    pub name:    String,
    pub bits:    u32,
    pub shift:   u32,
    /// Smallest type an accessor hands the slot out as.
    pub storage: PrimitiveType,
}

impl BitSlot {
    /// Mask of the slot's bits, already shifted into place.
    pub fn mask(&self) -> u64 {
        let width = if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        };
        width << self.shift
    }
}

/// Opaque serializable type bound with `from <path> import <Name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomType {
    pub name:    String,
    pub include: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub target:     TypeRef,
    /// SQL text appended after `REFERENCES <target>`, e.g. `ON DELETE CASCADE`.
    pub constraint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Enum(TypeRef),
    Bitfield(TypeRef),
    FixedArray { element: PrimitiveType, count: u32 },
    VariableArray { element: PrimitiveType, prefix: SizePrefix },
    Squeeze { storage: PrimitiveType, slots: Vec<BitSlot> },
    Vector(Box<FieldType>),
    Embedded(TypeRef),
    Custom(CustomType),
    ForeignKey(ForeignKey),
    Bytes,
    Text,
    Json,
}

impl FieldType {
    /// Integer a scalar member is kept in, if it is a scalar at all.
    pub fn storage(&self) -> Option<PrimitiveType> {
        match self {
            FieldType::Primitive(p) => Some(*p),
            FieldType::Enum(r) | FieldType::Bitfield(r) => r.storage,
            FieldType::Squeeze { storage, .. } => Some(*storage),
            _ => None,
        }
    }

    /// Bytes the field occupies in a fixed-layout buffer, `None` when variable.
    pub fn static_size(&self) -> Option<usize> {
        match self {
            FieldType::FixedArray { element, count } => Some(element.byte_size() * *count as usize),
            other => other.storage().map(PrimitiveType::byte_size),
        }
    }

    /// Whether the in-memory member is a container or handle rather than a plain value.
    pub fn is_reference(&self) -> bool {
        self.storage().is_none() && !matches!(self, FieldType::FixedArray { .. })
    }

    /// Short human readable spelling, used in diagnostics and dumps.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Primitive(p) => p.name().to_string(),
            FieldType::Enum(r) | FieldType::Bitfield(r) | FieldType::Embedded(r) => r.name.clone(),
            FieldType::FixedArray { element, count } => format!("{}[{}]", element, count),
            FieldType::VariableArray { element, prefix } => format!("{}[{}]", element, prefix.marker()),
            FieldType::Squeeze { storage, slots } => {
                let parts: Vec<String> = slots.iter().map(|s| format!("{}({})", s.name, s.bits)).collect();
                format!("{} {}", storage, parts.join(","))
            }
            FieldType::Vector(inner) => format!("{}[]", inner.describe()),
            FieldType::Custom(c) => c.name.clone(),
            FieldType::ForeignKey(fk) => format!("foreign {}", fk.target.name),
            FieldType::Bytes => "bytes".to_string(),
            FieldType::Text => "string".to_string(),
            FieldType::Json => "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    Integer,
    Blob,
    Text,
}

/// Where a field lives in the view its definition kind serializes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    /// Protocol field inside the static block.
    Static { offset: usize, size: usize },
    /// Protocol field after the static block; `index` counts trailing fields in order.
    Trailing { prefix: SizePrefix, index: usize },
    /// Table field addressed through its vtable slot.
    Slot { index: u16, max_count: Option<u32> },
    /// Record column.
    Column { sql_type: SqlType },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub public_name:   String,
    pub internal_name: String,
    pub line:          usize,
    pub is_deprecated: bool,
    pub is_virtual:    bool,
    pub ty:            FieldType,
    pub placement:     Placement,
    pub policy:        ValuePolicy,
}

impl Field {
    pub fn storage(&self) -> Option<PrimitiveType> {
        self.ty.storage()
    }

    /// Static byte offset for protocol fields in the fixed block.
    pub fn offset(&self) -> Option<usize> {
        match self.placement {
            Placement::Static { offset, .. } => Some(offset),
            _ => None,
        }
    }
}
