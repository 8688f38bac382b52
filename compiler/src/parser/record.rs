use std::collections::HashSet;
use std::path::PathBuf;

use defc_schema::{DefId, DefinitionKind, FieldType, ForeignKey, RecordDefinition, TypeRef};
use lazy_static::lazy_static;
use regex::Regex;

use super::{claim_name, parse_import, split_modifiers, with_default_extension, Scope};
use crate::error::DefError;
use crate::layout::layout_record;
use crate::registry::Registry;
use crate::types::{ParsedField, SourceFile};
use crate::utils::{error, quote};

lazy_static! {
    static ref FOREIGN: Regex = Regex::new(
        r"^foreign\s+(\S+)\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+(.+))?$"
    ).unwrap();
    static ref FIELD:   Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)\s+([A-Za-z_][A-Za-z0-9_]*)$"
    ).unwrap();
}

const IMPORTABLE: &[DefinitionKind] = &[DefinitionKind::Enum, DefinitionKind::Bitfield];

/// Parses a record body: plain columns and `foreign` row references.
pub fn parse_record(
    file: &SourceFile,
    registry: &mut Registry,
) -> Result<(RecordDefinition, Vec<DefId>), DefError> {
    let mut scope      = Scope::new(DefinitionKind::Record, IMPORTABLE, false);
    let mut drafts     = Vec::new();
    let mut names      = HashSet::new();
    let mut references = Vec::new();

    scope.import_header(registry, file)?;

    for line in &file.body {
        if let Some(directive) = parse_import(file, line)? {
            scope.import(registry, file, line, directive)?;
            continue;
        }

        let modifiers = split_modifiers(&line.text);
        if modifiers.is_virtual {
            return Err(error(&file.display, line.number, "Record columns cannot be virtual"));
        }

        let mut draft = if let Some(caps) = FOREIGN.captures(modifiers.rest) {
            let path = with_default_extension(PathBuf::from(&caps[1]), DefinitionKind::Record);
            let id   = registry.resolve_import(DefinitionKind::Record, &path, file, line.number)?;
            let name = &caps[2];
            claim_name(&mut names, file, line.number, name)?;

            scope.add_import(id);
            if !references.contains(&id) {
                references.push(id);
            }
            let target = TypeRef {
                id,
                name:    registry[id].name.clone(),
                storage: None,
            };
            let constraint = caps.get(3).map_or("", |m| m.as_str().trim()).to_string();
            ParsedField::new(name, line.number, FieldType::ForeignKey(ForeignKey { target, constraint }))
        } else if let Some(caps) = FIELD.captures(modifiers.rest) {
            let ty = column_type(&scope, file, line.number, &caps[1])?;
            let name = &caps[2];
            claim_name(&mut names, file, line.number, name)?;
            ParsedField::new(name, line.number, ty)
        } else {
            return Err(error(
                &file.display,
                line.number,
                &format!(
                    "Expected type name or foreign <path> name [constraints] but found {}",
                    quote(&line.text)
                ),
            ));
        };

        draft.is_deprecated = modifiers.is_deprecated;
        drafts.push(draft);
    }

    let (imports, _) = scope.into_parts();
    Ok((layout_record(drafts, references), imports))
}

fn column_type(scope: &Scope, file: &SourceFile, line: usize, name: &str) -> Result<FieldType, DefError> {
    match name {
        "string" | "std::string" => Ok(FieldType::Text),
        "bytes" | "Buffer" | "String" => Ok(FieldType::Bytes),
        "json" => Ok(FieldType::Json),
        _ => scope.named_type(file, line, name),
    }
}
