//! Width inference, offsets, vtable slots and creation ordering.
//!
//! Parsers hand their field drafts here once every line of a definition has
//! been read; nothing in this module touches the source text again.

use std::collections::HashSet;

use defc_schema::{
    storage_for_bits, underlying_for_bits, BitSlot, CustomType, DefId, Field, FieldType, MaxSize, Placement,
    PrimitiveType, ProtocolDefinition, RecordDefinition, SqlType, TableDefinition, ValuePolicy,
    Visibility,
};

use crate::error::DefError;
use crate::types::{ParsedField, SourceFile};
use crate::utils::to_snake_case;

/// Bytes every finished table buffer spends before its first field:
/// size prefix, root offset, vtable header and the table's vtable offset.
const TABLE_OVERHEAD: usize = 4 + 4 + 4 + 4;
const VTABLE_ENTRY:   usize = 2;
const UOFFSET:        usize = 4;
const LENGTH_PREFIX:  usize = 4;

/// Picks the integer an enum or bitfield is stored as.
///
/// The inferred type is the smallest of `uint8_t`..`uint64_t` holding `bits`;
/// a declared type wins only if it is at least as wide.
pub fn choose_underlying(
    file: &SourceFile,
    line: usize,
    bits: u32,
    declared: Option<PrimitiveType>,
) -> Result<PrimitiveType, DefError> {
    let inferred = underlying_for_bits(bits).ok_or_else(|| DefError::SqueezeOverflow {
        file:     file.display.clone(),
        line,
        name:     file.name.clone(),
        bits,
        storage:  PrimitiveType::UInt64.name().to_string(),
        capacity: PrimitiveType::UInt64.bits(),
    })?;

    match declared {
        Some(ty) if ty.bits() < inferred.bits() => Err(DefError::WidthTooSmall {
            file:     file.display.clone(),
            line,
            declared: ty.name().to_string(),
            required: inferred.name().to_string(),
        }),
        Some(ty) => Ok(ty),
        None => Ok(inferred),
    }
}

/// Total width of a run of slots, saturating instead of wrapping.
pub fn total_bits(slots: &[(String, u32)]) -> u32 {
    slots.iter().fold(0u32, |acc, (_, bits)| acc.saturating_add(*bits))
}

/// Assigns shifts in declaration order, first slot at bit 0.
pub fn assign_shifts(slots: &[(String, u32)]) -> Vec<BitSlot> {
    let mut shift = 0;
    slots
        .iter()
        .map(|(name, bits)| {
            let slot = BitSlot {
                name:    name.clone(),
                bits:    *bits,
                shift,
                storage: storage_for_bits(*bits).unwrap_or(PrimitiveType::UInt64),
            };
            shift += bits;
            slot
        })
        .collect()
}

fn make_field(draft: ParsedField, placement: Placement, policy: ValuePolicy) -> Field {
    Field {
        internal_name: to_snake_case(&draft.name),
        public_name:   draft.name,
        line:          draft.line,
        is_deprecated: draft.is_deprecated,
        is_virtual:    draft.is_virtual,
        ty:            draft.ty,
        placement,
        policy,
    }
}

/// Lays out a protocol message.
///
/// Fixed fields get consecutive offsets in declaration order; deprecated ones
/// keep theirs. Variable arrays get no offset and are numbered in the order
/// they are serialized after the fixed block.
pub fn layout_protocol(drafts: Vec<ParsedField>) -> ProtocolDefinition {
    let mut offset   = 0;
    let mut trailing = 0;
    let mut fields   = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let placement = match draft.ty {
            FieldType::VariableArray { prefix, .. } => {
                trailing += 1;
                Placement::Trailing { prefix, index: trailing - 1 }
            }
            ref ty => {
                let size = ty.static_size().unwrap_or(0);
                offset += size;
                Placement::Static { offset: offset - size, size }
            }
        };
        let policy = ValuePolicy::encoded(&draft.ty, draft.is_virtual);
        fields.push(make_field(draft, placement, policy));
    }

    ProtocolDefinition { fields, static_size: offset }
}

/// Worst case of a single field: its inline bytes plus, for bounded strings,
/// bytes, json and vectors, the out-of-line payload at its `(N)` limit.
/// Unbounded payloads and nested tables only count their offset. Deprecated
/// fields are never written.
fn worst_case_size(field: &Field) -> usize {
    if field.is_deprecated {
        return 0;
    }
    let max_count = match field.placement {
        Placement::Slot { max_count, .. } => max_count.map(|n| n as usize),
        _ => None,
    };
    let payload = match (&field.ty, max_count) {
        // strings carry a terminating zero
        (FieldType::Text | FieldType::Json, Some(n)) => LENGTH_PREFIX + n + 1,
        (FieldType::Bytes, Some(n)) => LENGTH_PREFIX + n,
        (FieldType::Vector(element), Some(n)) => LENGTH_PREFIX + n * inline_size(element),
        _ => 0,
    };
    inline_size(&field.ty) + payload
}

fn inline_size(ty: &FieldType) -> usize {
    ty.storage().map_or(UOFFSET, PrimitiveType::byte_size)
}

/// Largest buffer an instance can serialize to when every bounded field is
/// filled up to its limit and every scalar is present.
pub fn bounded_table_size(fields: &[Field]) -> usize {
    let body: usize = fields.iter().map(worst_case_size).sum();
    TABLE_OVERHEAD + VTABLE_ENTRY * fields.len() + body
}

/// Assigns vtable slots and checks the size budget.
///
/// Only a `max_size` written in the file is checked here; the default one is
/// recorded for emitters, which enforce it on every serialized instance.
pub fn layout_table(
    file: &SourceFile,
    drafts: Vec<ParsedField>,
    max_size: MaxSize,
    visibility: Visibility,
    custom_types: Vec<CustomType>,
) -> Result<TableDefinition, DefError> {
    let mut fields = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        let index = u16::try_from(index).map_err(|_| {
            crate::utils::error(&file.display, draft.line, "A table has at most 65536 fields")
        })?;
        let placement = Placement::Slot { index, max_count: draft.max_count };
        let policy    = ValuePolicy::encoded(&draft.ty, draft.is_virtual);
        fields.push(make_field(draft, placement, policy));
    }

    let bounded_size = bounded_table_size(&fields);
    if let MaxSize::Declared(limit) = max_size {
        if limit > 0 && bounded_size > limit as usize {
            return Err(DefError::SizeBudgetExceeded {
                file:     file.display.clone(),
                max_size: limit,
                required: bounded_size,
            });
        }
    }

    Ok(TableDefinition {
        fields,
        max_size,
        visibility,
        bounded_size,
        custom_types,
    })
}

pub fn sql_type(ty: &FieldType) -> SqlType {
    match ty {
        FieldType::Text | FieldType::Json => SqlType::Text,
        FieldType::Bytes
        | FieldType::Custom(_)
        | FieldType::Embedded(_)
        | FieldType::Vector(_)
        | FieldType::FixedArray { .. }
        | FieldType::VariableArray { .. } => SqlType::Blob,
        FieldType::Primitive(_)
        | FieldType::Enum(_)
        | FieldType::Bitfield(_)
        | FieldType::Squeeze { .. }
        | FieldType::ForeignKey(_) => SqlType::Integer,
    }
}

pub fn layout_record(drafts: Vec<ParsedField>, references: Vec<DefId>) -> RecordDefinition {
    let fields = drafts
        .into_iter()
        .map(|draft| {
            let placement = Placement::Column { sql_type: sql_type(&draft.ty) };
            let policy    = ValuePolicy::sql(&draft.ty);
            make_field(draft, placement, policy)
        })
        .collect();
    RecordDefinition { fields, references }
}

/// Depth-first post-order from `root`: every node comes after everything it
/// points at, `root` last. The graph must be acyclic.
pub fn post_order<F>(root: DefId, mut edges: F) -> Vec<DefId>
where
    F: FnMut(DefId) -> Vec<DefId>,
{
    fn visit<F>(id: DefId, edges: &mut F, seen: &mut HashSet<DefId>, out: &mut Vec<DefId>)
    where
        F: FnMut(DefId) -> Vec<DefId>,
    {
        if !seen.insert(id) {
            return;
        }
        for next in edges(id) {
            visit(next, edges, seen, out);
        }
        out.push(id);
    }

    let mut seen = HashSet::new();
    let mut out  = Vec::new();
    visit(root, &mut edges, &mut seen, &mut out);
    out
}
