//! Line parsers, one per definition kind.
//!
//! Every parser walks the body of a [`SourceFile`] top to bottom. A line that
//! is neither an import, a directive nor a field is a syntax error; nothing is
//! skipped silently.

mod bitfield;
mod enums;
mod protocol;
mod record;
mod table;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use defc_schema::{CustomType, DefId, DefinitionBody, DefinitionKind, FieldType, PrimitiveType, TypeRef};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::error::DefError;
use crate::registry::Registry;
use crate::types::{ImportDirective, SourceFile, SourceLine};
use crate::utils::{error, quote};

pub use bitfield::parse_bitfield;
pub use enums::parse_enum;

lazy_static! {
    static ref IMPORT_PATH:   Regex = Regex::new(r"^import\s+(\S+)$").unwrap();
    static ref FROM_IMPORT:   Regex = Regex::new(r"^from\s+(\S+)\s+import\s+([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
    static ref TAGGED_IMPORT: Regex = Regex::new(r"^([a-z]+)\s+(\S+)$").unwrap();
    static ref MODIFIERS:     Regex = Regex::new(r"^(~)?\s*(?:(virtual)\s+)?(.*)$").unwrap();
}

/// Parses one definition of the given kind, resolving its imports through `registry`.
pub(crate) fn parse_definition(
    kind: DefinitionKind,
    file: &SourceFile,
    registry: &mut Registry,
) -> Result<(DefinitionBody, Vec<DefId>), DefError> {
    match kind {
        DefinitionKind::Enum => {
            forbid_header(file, kind)?;
            Ok((DefinitionBody::Enum(parse_enum(file)?), Vec::new()))
        }
        DefinitionKind::Bitfield => {
            forbid_header(file, kind)?;
            Ok((DefinitionBody::Bitfield(parse_bitfield(file)?), Vec::new()))
        }
        DefinitionKind::Protocol => {
            let (def, imports) = protocol::parse_protocol(file, registry)?;
            Ok((DefinitionBody::Protocol(def), imports))
        }
        DefinitionKind::Table => {
            let (def, imports) = table::parse_table(file, registry)?;
            Ok((DefinitionBody::Table(def), imports))
        }
        DefinitionKind::Record => {
            let (def, imports) = record::parse_record(file, registry)?;
            Ok((DefinitionBody::Record(def), imports))
        }
    }
}

fn forbid_header(file: &SourceFile, kind: DefinitionKind) -> Result<(), DefError> {
    match file.header.first() {
        Some(line) => Err(error(
            &file.display,
            line.number,
            &format!("A {} definition cannot import other definitions", kind),
        )),
        None => Ok(()),
    }
}

/// Recognizes `import <path>`, `from <path> import <Name>` and `<tag> <path>`.
/// Returns `None` when the line is not an import at all.
pub(crate) fn parse_import(
    file: &SourceFile,
    line: &SourceLine,
) -> Result<Option<ImportDirective>, DefError> {
    if let Some(caps) = FROM_IMPORT.captures(&line.text) {
        return Ok(Some(ImportDirective::Custom {
            name:    caps[2].to_string(),
            include: caps[1].to_string(),
        }));
    }

    if let Some(caps) = IMPORT_PATH.captures(&line.text) {
        let path = PathBuf::from(&caps[1]);
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DefinitionKind::from_extension)
            .ok_or_else(|| {
                error(
                    &file.display,
                    line.number,
                    &format!("Cannot infer the definition kind of {}", quote(&caps[1])),
                )
            })?;
        return Ok(Some(ImportDirective::Definition { kind, path }));
    }

    if let Some(caps) = TAGGED_IMPORT.captures(&line.text) {
        if let Some(kind) = DefinitionKind::from_tag(&caps[1]) {
            let path = with_default_extension(PathBuf::from(&caps[2]), kind);
            return Ok(Some(ImportDirective::Definition { kind, path }));
        }
    }

    Ok(None)
}

/// Header lines must all be imports.
pub(crate) fn parse_header_import(
    file: &SourceFile,
    line: &SourceLine,
) -> Result<ImportDirective, DefError> {
    parse_import(file, line)?.ok_or_else(|| {
        error(
            &file.display,
            line.number,
            &format!("Expected an import directive but found {}", quote(&line.text)),
        )
    })
}

pub(crate) fn with_default_extension(path: PathBuf, kind: DefinitionKind) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(kind.extension())
    }
}

/// `~` and `virtual` prefixes of a protocol, table or record line.
pub(crate) struct Modifiers<'a> {
    pub is_deprecated: bool,
    pub is_virtual:    bool,
    pub rest:          &'a str,
}

pub(crate) fn split_modifiers(text: &str) -> Modifiers<'_> {
    match MODIFIERS.captures(text) {
        Some(caps) => Modifiers {
            is_deprecated: caps.get(1).is_some(),
            is_virtual:    caps.get(2).is_some(),
            rest:          caps.get(3).map_or("", |m| m.as_str().trim()),
        },
        None => Modifiers { is_deprecated: false, is_virtual: false, rest: text },
    }
}

pub(crate) fn parse_count(file: &SourceFile, line: usize, text: &str) -> Result<u32, DefError> {
    text.parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            error(
                &file.display,
                line,
                &format!("Expected a positive count but found {}", quote(text)),
            )
        })
}

/// Rejects a second declaration of the same name within one definition.
pub(crate) fn claim_name(
    names: &mut HashSet<String>,
    file: &SourceFile,
    line: usize,
    name: &str,
) -> Result<(), DefError> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(DefError::DuplicateName {
            file: file.display.clone(),
            line,
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Symbol {
    Definition(TypeRef, DefinitionKind),
    Custom(CustomType),
}

/// Names a definition has imported so far, with the line each became visible on.
pub(crate) struct Scope {
    importer:     DefinitionKind,
    allowed:      &'static [DefinitionKind],
    allow_custom: bool,
    symbols:      HashMap<String, (usize, Symbol)>,
    imports:      Vec<DefId>,
    customs:      Vec<CustomType>,
}

impl Scope {
    pub fn new(
        importer: DefinitionKind,
        allowed: &'static [DefinitionKind],
        allow_custom: bool,
    ) -> Scope {
        Scope {
            importer,
            allowed,
            allow_custom,
            symbols: HashMap::new(),
            imports: Vec::new(),
            customs: Vec::new(),
        }
    }

    /// Imports every header line.
    pub fn import_header(&mut self, registry: &mut Registry, file: &SourceFile) -> Result<(), DefError> {
        for line in &file.header {
            let directive = parse_header_import(file, line)?;
            self.import(registry, file, line, directive)?;
        }
        Ok(())
    }

    pub fn import(
        &mut self,
        registry: &mut Registry,
        file: &SourceFile,
        line: &SourceLine,
        directive: ImportDirective,
    ) -> Result<(), DefError> {
        match directive {
            ImportDirective::Definition { kind, path } => {
                if !self.allowed.contains(&kind) {
                    return Err(error(
                        &file.display,
                        line.number,
                        &format!("A {} definition cannot import {} definitions", self.importer, kind),
                    ));
                }
                let id  = registry.resolve_import(kind, &path, file, line.number)?;
                let def = &registry[id];
                trace!(from = %file.display, to = %def.name, "import edge");
                let symbol = Symbol::Definition(
                    TypeRef {
                        id,
                        name:    def.name.clone(),
                        storage: def.underlying(),
                    },
                    kind,
                );
                let name = def.name.clone();
                self.bind(file, line.number, name, symbol)?;
                self.add_import(id);
            }
            ImportDirective::Custom { name, include } => {
                if !self.allow_custom {
                    return Err(error(
                        &file.display,
                        line.number,
                        &format!("A {} definition cannot import custom types", self.importer),
                    ));
                }
                let custom = CustomType { name: name.clone(), include };
                self.bind(file, line.number, name, Symbol::Custom(custom.clone()))?;
                if !self.customs.contains(&custom) {
                    self.customs.push(custom);
                }
            }
        }
        Ok(())
    }

    fn bind(&mut self, file: &SourceFile, line: usize, name: String, symbol: Symbol) -> Result<(), DefError> {
        match self.symbols.get(&name) {
            // the same import twice is harmless
            Some((_, existing)) if *existing == symbol => Ok(()),
            Some(_) => Err(DefError::DuplicateName {
                file: file.display.clone(),
                line,
                name,
            }),
            None => {
                self.symbols.insert(name, (line, symbol));
                Ok(())
            }
        }
    }

    pub fn add_import(&mut self, id: DefId) {
        if !self.imports.contains(&id) {
            self.imports.push(id);
        }
    }

    /// Looks `name` up as seen from `line`: only earlier imports are visible.
    pub fn lookup(&self, name: &str, line: usize) -> Option<&Symbol> {
        self.symbols
            .get(name)
            .filter(|(at, _)| *at < line)
            .map(|(_, symbol)| symbol)
    }

    /// Resolves a type name to a primitive or an imported definition.
    pub fn named_type(&self, file: &SourceFile, line: usize, name: &str) -> Result<FieldType, DefError> {
        if let Some(p) = PrimitiveType::from_name(name) {
            return Ok(FieldType::Primitive(p));
        }
        match self.lookup(name, line) {
            Some(Symbol::Definition(r, DefinitionKind::Enum)) => Ok(FieldType::Enum(r.clone())),
            Some(Symbol::Definition(r, DefinitionKind::Bitfield)) => Ok(FieldType::Bitfield(r.clone())),
            Some(Symbol::Definition(r, DefinitionKind::Table)) => Ok(FieldType::Embedded(r.clone())),
            Some(Symbol::Definition(r, kind)) => Err(error(
                &file.display,
                line,
                &format!("{} definition {} cannot be used as a field type", kind, quote(&r.name)),
            )),
            Some(Symbol::Custom(c)) => Ok(FieldType::Custom(c.clone())),
            None => Err(DefError::UnknownType {
                file: file.display.clone(),
                line,
                name: name.to_string(),
            }),
        }
    }

    pub fn into_parts(self) -> (Vec<DefId>, Vec<CustomType>) {
        (self.imports, self.customs)
    }
}
