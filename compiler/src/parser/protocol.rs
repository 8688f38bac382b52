use std::collections::HashSet;

use defc_schema::{DefId, DefinitionKind, FieldType, PrimitiveType, ProtocolDefinition, SizePrefix};
use lazy_static::lazy_static;
use regex::Regex;

use super::bitfield::parse_slots;
use super::{claim_name, parse_count, parse_import, split_modifiers, Scope};
use crate::error::DefError;
use crate::layout::{assign_shifts, layout_protocol, total_bits};
use crate::registry::Registry;
use crate::types::{ParsedField, SourceFile};
use crate::utils::{error, quote};

lazy_static! {
    static ref FIELD:   Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[([^\]]*)\])?\s+([A-Za-z_][A-Za-z0-9_]*)$"
    ).unwrap();
    static ref SQUEEZE: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s+(.*\(.*)$").unwrap();
}

const IMPORTABLE: &[DefinitionKind] = &[DefinitionKind::Enum, DefinitionKind::Bitfield];

/// Parses a protocol message body into laid out fields.
pub fn parse_protocol(
    file: &SourceFile,
    registry: &mut Registry,
) -> Result<(ProtocolDefinition, Vec<DefId>), DefError> {
    let mut scope  = Scope::new(DefinitionKind::Protocol, IMPORTABLE, false);
    let mut drafts = Vec::new();
    let mut names  = HashSet::new();

    scope.import_header(registry, file)?;

    for line in &file.body {
        if let Some(directive) = parse_import(file, line)? {
            scope.import(registry, file, line, directive)?;
            continue;
        }

        let modifiers = split_modifiers(&line.text);
        let mut draft = if let Some(caps) = SQUEEZE.captures(modifiers.rest) {
            // 1) uint16_t a(3), b(5)
            let storage = squeeze_storage(&scope, file, line.number, &caps[1])?;
            let slots   = parse_slots(file, line.number, &caps[2], &mut names)?;
            let bits    = total_bits(&slots);
            let name    = slots.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join("_");
            if bits > storage.bits() {
                return Err(DefError::SqueezeOverflow {
                    file:     file.display.clone(),
                    line:     line.number,
                    name,
                    bits,
                    storage:  storage.name().to_string(),
                    capacity: storage.bits(),
                });
            }
            if slots.len() > 1 {
                claim_name(&mut names, file, line.number, &name)?;
            }
            ParsedField::new(
                &name,
                line.number,
                FieldType::Squeeze { storage, slots: assign_shifts(&slots) },
            )
        } else if let Some(caps) = FIELD.captures(modifiers.rest) {
            // 2) type name, type[N] name, type[var] name
            let name = &caps[3];
            let ty = match caps.get(2) {
                None => scope.named_type(file, line.number, &caps[1])?,
                Some(size) => {
                    let element = array_element(&scope, file, line.number, &caps[1])?;
                    array_type(file, line.number, element, size.as_str())?
                }
            };
            claim_name(&mut names, file, line.number, name)?;
            ParsedField::new(name, line.number, ty)
        } else {
            return Err(error(
                &file.display,
                line.number,
                &format!(
                    "Expected type name, type[size] name or type slot(bits), ... but found {}",
                    quote(&line.text)
                ),
            ));
        };

        draft.is_deprecated = modifiers.is_deprecated;
        draft.is_virtual    = modifiers.is_virtual;
        drafts.push(draft);
    }

    let (imports, _) = scope.into_parts();
    Ok((layout_protocol(drafts), imports))
}

fn squeeze_storage(scope: &Scope, file: &SourceFile, line: usize, name: &str) -> Result<PrimitiveType, DefError> {
    match scope.named_type(file, line, name)? {
        FieldType::Primitive(p) if p.is_integer() => Ok(p),
        other => Err(error(
            &file.display,
            line,
            &format!("Squeezed slots need an integer type, not {}", quote(&other.describe())),
        )),
    }
}

fn array_element(scope: &Scope, file: &SourceFile, line: usize, name: &str) -> Result<PrimitiveType, DefError> {
    match scope.named_type(file, line, name)? {
        FieldType::Primitive(p) if p.is_integer() => Ok(p),
        other => Err(DefError::UnsupportedArrayElement {
            file:    file.display.clone(),
            line,
            element: other.describe(),
            kind:    DefinitionKind::Protocol,
        }),
    }
}

fn array_type(file: &SourceFile, line: usize, element: PrimitiveType, size: &str) -> Result<FieldType, DefError> {
    let size = size.trim();
    if size.is_empty() {
        return Err(error(
            &file.display,
            line,
            "Protocol arrays need a count or one of var, Var, VAR",
        ));
    }
    if size.chars().all(|c| c.is_ascii_digit()) {
        let count = parse_count(file, line, size)?;
        return Ok(FieldType::FixedArray { element, count });
    }
    match SizePrefix::from_marker(size) {
        Some(prefix) => Ok(FieldType::VariableArray { element, prefix }),
        None => Err(error(
            &file.display,
            line,
            &format!("Unknown array size {}", quote(size)),
        )),
    }
}
