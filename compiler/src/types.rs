use std::path::PathBuf;

use defc_schema::{DefinitionKind, FieldType};

/// One meaningful line of a definition file, numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub number: usize,
    pub text:   String,
}

/// A definition file split into its documentation, header and body sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Normalized path relative to the definition root.
    pub path:    PathBuf,
    /// Spelling used in diagnostics.
    pub display: String,
    pub name:    String,
    pub doc:     String,
    pub header:  Vec<SourceLine>,
    pub body:    Vec<SourceLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDirective {
    /// `enum a/B.the`, `import a/B.the`, ...
    Definition { kind: DefinitionKind, path: PathBuf },
    /// `from <include> import <Name>`
    Custom { name: String, include: String },
}

/// A field as written, before the layout engine places it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedField {
    pub name:          String,
    pub line:          usize,
    pub is_deprecated: bool,
    pub is_virtual:    bool,
    pub ty:            FieldType,
    /// `(N)` suffix on table fields.
    pub max_count:     Option<u32>,
}

impl ParsedField {
    pub fn new(name: &str, line: usize, ty: FieldType) -> ParsedField {
        ParsedField {
            name: name.to_string(),
            line,
            is_deprecated: false,
            is_virtual: false,
            ty,
            max_count: None,
        }
    }
}
