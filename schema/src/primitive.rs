use serde::Serialize;
use std::fmt;

/// Fixed-width scalar types a definition may name directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

/// Source spelling of every primitive, widest first.
pub const PRIMITIVE_TYPES: [(&str, PrimitiveType); 9] = [
    ("int64_t",  PrimitiveType::Int64),
    ("uint64_t", PrimitiveType::UInt64),
    ("int32_t",  PrimitiveType::Int32),
    ("uint32_t", PrimitiveType::UInt32),
    ("int16_t",  PrimitiveType::Int16),
    ("uint16_t", PrimitiveType::UInt16),
    ("int8_t",   PrimitiveType::Int8),
    ("uint8_t",  PrimitiveType::UInt8),
    ("bool",     PrimitiveType::Bool),
];

/// Candidate underlying types for enums and bitfields, smallest first.
const UNDERLYING_TYPES: [PrimitiveType; 4] = [
    PrimitiveType::UInt8,
    PrimitiveType::UInt16,
    PrimitiveType::UInt32,
    PrimitiveType::UInt64,
];

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        PRIMITIVE_TYPES
            .iter()
            .find(|(spelling, _)| *spelling == name)
            .map(|(_, ty)| *ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool   => "bool",
            PrimitiveType::Int8   => "int8_t",
            PrimitiveType::UInt8  => "uint8_t",
            PrimitiveType::Int16  => "int16_t",
            PrimitiveType::UInt16 => "uint16_t",
            PrimitiveType::Int32  => "int32_t",
            PrimitiveType::UInt32 => "uint32_t",
            PrimitiveType::Int64  => "int64_t",
            PrimitiveType::UInt64 => "uint64_t",
        }
    }

    /// Value bits. `bool` counts as a single bit.
    pub fn bits(self) -> u32 {
        match self {
            PrimitiveType::Bool => 1,
            PrimitiveType::Int8 | PrimitiveType::UInt8 => 8,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 16,
            PrimitiveType::Int32 | PrimitiveType::UInt32 => 32,
            PrimitiveType::Int64 | PrimitiveType::UInt64 => 64,
        }
    }

    /// Bytes occupied in a serialized buffer. A `bool` still takes a whole byte.
    pub fn byte_size(self) -> usize {
        match self {
            PrimitiveType::Bool => 1,
            other => (other.bits() / 8) as usize,
        }
    }

    pub fn is_integer(self) -> bool {
        self != PrimitiveType::Bool
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 | PrimitiveType::Int64
        )
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bits needed to represent `value` itself.
pub fn bits_for_value(value: u64) -> u32 {
    64 - value.leading_zeros()
}

/// Smallest unsigned integer type holding at least `bits` bits.
///
/// Never returns `bool`: a one-bit requirement still yields `uint8_t`.
/// Returns `None` when no integer type is wide enough.
pub fn underlying_for_bits(bits: u32) -> Option<PrimitiveType> {
    UNDERLYING_TYPES.iter().copied().find(|ty| ty.bits() >= bits)
}

/// Smallest type for a single packed slot of `bits` bits; one bit maps to `bool`.
pub fn storage_for_bits(bits: u32) -> Option<PrimitiveType> {
    if bits == 1 {
        Some(PrimitiveType::Bool)
    } else {
        underlying_for_bits(bits)
    }
}

/// Width of the length prefix in front of a variable-length array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SizePrefix {
    /// `var`
    U8,
    /// `Var`
    U16,
    /// `VAR`
    U32,
}

impl SizePrefix {
    pub fn from_marker(marker: &str) -> Option<SizePrefix> {
        match marker {
            "var" => Some(SizePrefix::U8),
            "Var" => Some(SizePrefix::U16),
            "VAR" => Some(SizePrefix::U32),
            _ => None,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            SizePrefix::U8  => "var",
            SizePrefix::U16 => "Var",
            SizePrefix::U32 => "VAR",
        }
    }

    pub fn primitive(self) -> PrimitiveType {
        match self {
            SizePrefix::U8  => PrimitiveType::UInt8,
            SizePrefix::U16 => PrimitiveType::UInt16,
            SizePrefix::U32 => PrimitiveType::UInt32,
        }
    }

    pub fn bits(self) -> u32 {
        self.primitive().bits()
    }
}
