use std::collections::HashSet;

use defc_schema::{BitfieldDefinition, PrimitiveType};
use lazy_static::lazy_static;
use regex::Regex;

use super::claim_name;
use crate::error::DefError;
use crate::layout::{assign_shifts, choose_underlying, total_bits};
use crate::types::SourceFile;
use crate::utils::{error, quote};

const SLOT_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*\s*\(\s*\d+\s*\)";

lazy_static! {
    static ref TYPE_DIRECTIVE: Regex = Regex::new(r"^type\s+([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
    static ref SLOT_LIST:      Regex = Regex::new(
        &format!(r"^{0}(?:\s*,\s*{0})*\s*,?$", SLOT_PATTERN)
    ).unwrap();
    static ref SLOT:           Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*(\d+)\s*\)").unwrap();
}

/// Checks a `name(bits), ...` list and returns the slots in order.
pub(crate) fn parse_slots(
    file: &SourceFile,
    line: usize,
    text: &str,
    names: &mut HashSet<String>,
) -> Result<Vec<(String, u32)>, DefError> {
    if !SLOT_LIST.is_match(text) {
        return Err(error(
            &file.display,
            line,
            &format!("Expected name(bits)[, name(bits)]* but found {}", quote(text)),
        ));
    }
    let mut slots = Vec::new();
    for caps in SLOT.captures_iter(text) {
        let name = caps[1].to_string();
        let bits = caps[2].parse::<u32>().ok().filter(|b| *b > 0).ok_or_else(|| {
            error(
                &file.display,
                line,
                &format!("Slot {} needs at least one bit", quote(&name)),
            )
        })?;
        claim_name(names, file, line, &name)?;
        slots.push((name, bits));
    }
    Ok(slots)
}

/// Parses a bitfield body: slot lists and at most one `type <underlying>` line.
pub fn parse_bitfield(file: &SourceFile) -> Result<BitfieldDefinition, DefError> {
    let mut declared: Option<(usize, PrimitiveType)> = None;
    let mut slots = Vec::new();
    let mut names = HashSet::new();

    for line in &file.body {
        if let Some(caps) = TYPE_DIRECTIVE.captures(&line.text) {
            if declared.is_some() {
                return Err(error(&file.display, line.number, "The bitfield type is declared twice"));
            }
            let ty = PrimitiveType::from_name(&caps[1]).ok_or_else(|| DefError::UnknownType {
                file: file.display.clone(),
                line: line.number,
                name: caps[1].to_string(),
            })?;
            if ty.is_signed() {
                return Err(error(
                    &file.display,
                    line.number,
                    &format!("The bitfield type {} must be unsigned", quote(ty.name())),
                ));
            }
            declared = Some((line.number, ty));
            continue;
        }
        slots.extend(parse_slots(file, line.number, &line.text, &mut names)?);
    }

    let total = total_bits(&slots);
    let line  = match declared {
        Some((l, _)) if total <= 64 => l,
        _ => file.body.last().map_or(0, |l| l.number),
    };
    let underlying = choose_underlying(file, line, total, declared.map(|(_, t)| t))?;

    Ok(BitfieldDefinition {
        slots: assign_shifts(&slots),
        underlying,
        declared: declared.map(|(_, t)| t),
        total_bits: total,
    })
}
