use std::collections::HashSet;

use defc_schema::{DefId, DefinitionKind, FieldType, MaxSize, TableDefinition, Visibility};
use lazy_static::lazy_static;
use regex::Regex;

use super::{claim_name, parse_count, parse_import, split_modifiers, Scope};
use crate::error::DefError;
use crate::layout::layout_table;
use crate::registry::Registry;
use crate::types::{ParsedField, SourceFile, SourceLine};
use crate::utils::{error, quote};

lazy_static! {
    static ref MAX_SIZE:         Regex = Regex::new(r"^max_size\s+(\d+)$").unwrap();
    static ref SERIALIZE_PUBLIC: Regex = Regex::new(r"^serialize_public\s+(true|false)$").unwrap();
    static ref FIELD:            Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*)(\[\])?(?:\(\s*(\d+)\s*\))?\s+([A-Za-z_][A-Za-z0-9_]*)$"
    ).unwrap();
}

const IMPORTABLE: &[DefinitionKind] = &[
    DefinitionKind::Enum,
    DefinitionKind::Bitfield,
    DefinitionKind::Table,
];

/// Parses a table body: fields, `max_size` and `serialize_public` directives,
/// definition and custom type imports.
pub fn parse_table(
    file: &SourceFile,
    registry: &mut Registry,
) -> Result<(TableDefinition, Vec<DefId>), DefError> {
    let mut scope      = Scope::new(DefinitionKind::Table, IMPORTABLE, true);
    let mut drafts     = Vec::new();
    let mut names      = HashSet::new();
    let mut max_size   = None;
    let mut visibility = None;

    scope.import_header(registry, file)?;

    for line in &file.body {
        if let Some(directive) = parse_import(file, line)? {
            scope.import(registry, file, line, directive)?;
            continue;
        }

        if let Some(caps) = MAX_SIZE.captures(&line.text) {
            let size = caps[1].parse::<u32>().map_err(|_| {
                error(&file.display, line.number, &format!("Invalid max_size {}", quote(&caps[1])))
            })?;
            set_once(&mut max_size, size, file, line, "max_size")?;
            continue;
        }

        if let Some(caps) = SERIALIZE_PUBLIC.captures(&line.text) {
            let vis = if &caps[1] == "true" {
                Visibility::Public
            } else {
                Visibility::Protected
            };
            set_once(&mut visibility, vis, file, line, "serialize_public")?;
            continue;
        }

        let modifiers = split_modifiers(&line.text);
        let caps = FIELD.captures(modifiers.rest).ok_or_else(|| {
            error(
                &file.display,
                line.number,
                &format!("Expected [~][virtual] type[[]][(max)] name but found {}", quote(&line.text)),
            )
        })?;

        let element = table_type(&scope, file, line.number, &caps[1])?;
        let ty = if caps.get(2).is_some() {
            FieldType::Vector(Box::new(element))
        } else {
            element
        };

        let max_count = match caps.get(3) {
            Some(m) => {
                if !matches!(ty, FieldType::Vector(_) | FieldType::Text | FieldType::Bytes | FieldType::Json) {
                    return Err(error(
                        &file.display,
                        line.number,
                        &format!("A size limit does not apply to {}", quote(&ty.describe())),
                    ));
                }
                Some(parse_count(file, line.number, m.as_str())?)
            }
            None => None,
        };

        let name = &caps[4];
        claim_name(&mut names, file, line.number, name)?;

        let mut draft = ParsedField::new(name, line.number, ty);
        draft.is_deprecated = modifiers.is_deprecated;
        draft.is_virtual    = modifiers.is_virtual;
        draft.max_count     = max_count;
        drafts.push(draft);
    }

    let (imports, customs) = scope.into_parts();
    let max_size = match max_size {
        Some(n) => MaxSize::Declared(n),
        None => MaxSize::Default(registry.default_max_size()),
    };
    let table = layout_table(
        file,
        drafts,
        max_size,
        visibility.unwrap_or(Visibility::Public),
        customs,
    )?;
    Ok((table, imports))
}

fn table_type(scope: &Scope, file: &SourceFile, line: usize, name: &str) -> Result<FieldType, DefError> {
    match name {
        "string" => Ok(FieldType::Text),
        "bytes" => Ok(FieldType::Bytes),
        "json" => Ok(FieldType::Json),
        _ => scope.named_type(file, line, name),
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, file: &SourceFile, line: &SourceLine, what: &str) -> Result<(), DefError> {
    if slot.is_some() {
        return Err(error(
            &file.display,
            line.number,
            &format!("{} is declared twice", what),
        ));
    }
    *slot = Some(value);
    Ok(())
}
