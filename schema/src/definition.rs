use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::field::{BitSlot, CustomType, Field, FieldType, Placement};
use crate::primitive::PrimitiveType;

/// Index of a definition inside the registry that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DefId(pub usize);

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefinitionKind {
    Enum,
    Bitfield,
    Protocol,
    Table,
    Record,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 5] = [
        DefinitionKind::Enum,
        DefinitionKind::Bitfield,
        DefinitionKind::Protocol,
        DefinitionKind::Table,
        DefinitionKind::Record,
    ];

    /// File extension of definitions of this kind, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DefinitionKind::Enum     => "the",
            DefinitionKind::Bitfield => "btx",
            DefinitionKind::Protocol => "thx",
            DefinitionKind::Table    => "tbx",
            DefinitionKind::Record   => "sqx",
        }
    }

    pub fn from_extension(ext: &str) -> Option<DefinitionKind> {
        Self::ALL.iter().copied().find(|k| k.extension() == ext)
    }

    /// Tag used in a header import line, e.g. `enum types/Color.the`.
    pub fn from_tag(tag: &str) -> Option<DefinitionKind> {
        match tag {
            "enum" => Some(DefinitionKind::Enum),
            "bit" | "bitfield" => Some(DefinitionKind::Bitfield),
            "protocol" => Some(DefinitionKind::Protocol),
            "table" => Some(DefinitionKind::Table),
            "record" | "sqx" => Some(DefinitionKind::Record),
            _ => None,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DefinitionKind::Enum     => "enum",
            DefinitionKind::Bitfield => "bitfield",
            DefinitionKind::Protocol => "protocol",
            DefinitionKind::Table    => "table",
            DefinitionKind::Record   => "record",
        };
        f.write_str(s)
    }
}

/// Synthesized enum elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sentinel {
    /// `VALUE_INVALID`, unknown integers decode to it.
    Invalid,
    /// `FLAGS_NONE`, no flag set.
    None,
    /// `FLAGS_ALL`, every flag set.
    All,
}

impl Sentinel {
    pub fn name(self) -> &'static str {
        match self {
            Sentinel::Invalid => "VALUE_INVALID",
            Sentinel::None    => "FLAGS_NONE",
            Sentinel::All     => "FLAGS_ALL",
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        [Sentinel::Invalid, Sentinel::None, Sentinel::All]
            .iter()
            .any(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumElement {
    pub name:     String,
    pub value:    u64,
    pub comment:  String,
    pub sentinel: Option<Sentinel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDefinition {
    pub elements:   Vec<EnumElement>,
    pub is_flags:   bool,
    pub underlying: PrimitiveType,
    /// Type given by a `type` directive, if any.
    pub declared:   Option<PrimitiveType>,
}

impl EnumDefinition {
    /// Elements written in the file, without sentinels.
    pub fn user_elements(&self) -> impl Iterator<Item = &EnumElement> {
        self.elements.iter().filter(|e| e.sentinel.is_none())
    }

    /// Name unknown values decode to: `VALUE_INVALID`, or `FLAGS_NONE` in flags mode.
    pub fn sentinel_name(&self) -> &'static str {
        if self.is_flags {
            Sentinel::None.name()
        } else {
            Sentinel::Invalid.name()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitfieldDefinition {
    pub slots:      Vec<BitSlot>,
    pub underlying: PrimitiveType,
    pub declared:   Option<PrimitiveType>,
    pub total_bits: u32,
}

impl BitfieldDefinition {
    /// `(name, shift)` pairs in declaration order.
    pub fn shift_table(&self) -> Vec<(&str, u32)> {
        self.slots.iter().map(|s| (s.name.as_str(), s.shift)).collect()
    }

    pub fn slot(&self, name: &str) -> Option<&BitSlot> {
        self.slots.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolDefinition {
    pub fields:      Vec<Field>,
    /// Bytes of the fixed block, deprecated fields included.
    pub static_size: usize,
}

impl ProtocolDefinition {
    pub fn fixed_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| matches!(f.placement, Placement::Static { .. }))
    }

    /// Length-prefixed fields in serialization order.
    pub fn variable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| matches!(f.placement, Placement::Trailing { .. }))
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|f| f.public_name == name)
            .and_then(Field::offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    Protected,
}

/// Size budget of a table, in bytes; `0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaxSize {
    /// Written as `max_size <bytes>`, checked against the bounded fields.
    Declared(u32),
    /// Taken from the compile options, only enforced on serialized instances.
    Default(u32),
}

impl MaxSize {
    pub fn bytes(self) -> u32 {
        match self {
            MaxSize::Declared(n) | MaxSize::Default(n) => n,
        }
    }

    pub fn is_declared(self) -> bool {
        matches!(self, MaxSize::Declared(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDefinition {
    pub fields:       Vec<Field>,
    pub max_size:     MaxSize,
    pub visibility:   Visibility,
    /// Worst-case serialized size with every bounded field at its limit.
    /// Unbounded strings, vectors and nested tables count their offset only.
    pub bounded_size: usize,
    pub custom_types: Vec<CustomType>,
}

impl TableDefinition {
    pub fn has_virtual_fields(&self) -> bool {
        self.fields.iter().any(|f| f.is_virtual && !f.is_deprecated)
    }

    /// Vtable slots, deprecated fields included.
    pub fn slot_count(&self) -> usize {
        self.fields.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDefinition {
    pub fields:     Vec<Field>,
    /// Records referenced through foreign keys, in declaration order.
    pub references: Vec<DefId>,
}

impl RecordDefinition {
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| matches!(f.ty, FieldType::ForeignKey(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefinitionBody {
    Enum(EnumDefinition),
    Bitfield(BitfieldDefinition),
    Protocol(ProtocolDefinition),
    Table(TableDefinition),
    Record(RecordDefinition),
}

/// One fully parsed and laid out definition file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub id:      DefId,
    pub name:    String,
    /// Path relative to the definition root.
    pub path:    PathBuf,
    pub doc:     String,
    /// Direct imports, in the order they were declared.
    pub imports: Vec<DefId>,
    pub body:    DefinitionBody,
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        match self.body {
            DefinitionBody::Enum(_)     => DefinitionKind::Enum,
            DefinitionBody::Bitfield(_) => DefinitionKind::Bitfield,
            DefinitionBody::Protocol(_) => DefinitionKind::Protocol,
            DefinitionBody::Table(_)    => DefinitionKind::Table,
            DefinitionBody::Record(_)   => DefinitionKind::Record,
        }
    }

    /// All declared fields, deprecated ones included. Empty for enums and bitfields.
    pub fn fields(&self) -> &[Field] {
        match &self.body {
            DefinitionBody::Protocol(p) => &p.fields,
            DefinitionBody::Table(t) => &t.fields,
            DefinitionBody::Record(r) => &r.fields,
            DefinitionBody::Enum(_) | DefinitionBody::Bitfield(_) => &[],
        }
    }

    /// Fields an emitter generates members for.
    pub fn active_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields().iter().filter(|f| !f.is_deprecated)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.public_name == name)
    }

    /// Integer an enum or bitfield is stored as.
    pub fn underlying(&self) -> Option<PrimitiveType> {
        match &self.body {
            DefinitionBody::Enum(e) => Some(e.underlying),
            DefinitionBody::Bitfield(b) => Some(b.underlying),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDefinition> {
        match &self.body {
            DefinitionBody::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_bitfield(&self) -> Option<&BitfieldDefinition> {
        match &self.body {
            DefinitionBody::Bitfield(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_protocol(&self) -> Option<&ProtocolDefinition> {
        match &self.body {
            DefinitionBody::Protocol(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableDefinition> {
        match &self.body {
            DefinitionBody::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordDefinition> {
        match &self.body {
            DefinitionBody::Record(r) => Some(r),
            _ => None,
        }
    }
}
