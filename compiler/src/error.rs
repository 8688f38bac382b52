use defc_schema::DefinitionKind;
use thiserror::Error;

/// Every way a compilation run can fail. All variants are terminal.
#[derive(Debug, Error)]
pub enum DefError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("Syntax error in {file} at line {line}: {reason}")]
    DefinitionSyntax {
        file:   String,
        line:   usize,
        reason: String,
    },

    #[error("Unknown type \"{name}\" in {file} at line {line}")]
    UnknownType {
        file: String,
        line: usize,
        name: String,
    },

    #[error("Cyclic import in {file} at line {line}: {}", .chain.join(" -> "))]
    CyclicImport {
        file:  String,
        line:  usize,
        chain: Vec<String>,
    },

    #[error("Declared type {declared} in {file} at line {line} is smaller than the required {required}")]
    WidthTooSmall {
        file:     String,
        line:     usize,
        declared: String,
        required: String,
    },

    #[error("\"{name}\" in {file} at line {line} needs {bits} bits but {storage} only holds {capacity}")]
    SqueezeOverflow {
        file:     String,
        line:     usize,
        name:     String,
        bits:     u32,
        storage:  String,
        capacity: u32,
    },

    #[error("{element} cannot be an array element in {kind} definition {file} at line {line}")]
    UnsupportedArrayElement {
        file:    String,
        line:    usize,
        element: String,
        kind:    DefinitionKind,
    },

    #[error("Table {file} can grow to {required} bytes but max_size is {max_size}")]
    SizeBudgetExceeded {
        file:     String,
        max_size: u32,
        required: usize,
    },

    #[error("\"{name}\" is declared twice in {file} (line {line})")]
    DuplicateName {
        file: String,
        line: usize,
        name: String,
    },

    #[error("Definition name \"{name}\" is used by both {first} and {second}")]
    DuplicateDefinition {
        name:   String,
        first:  String,
        second: String,
    },

    #[error("{path} was requested as a {expected} definition in {file} at line {line} but is a {actual}")]
    KindMismatch {
        file:     String,
        line:     usize,
        path:     String,
        expected: DefinitionKind,
        actual:   DefinitionKind,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DefError {
    /// File the error originated in, when there is one.
    pub fn file(&self) -> Option<&str> {
        match self {
            DefError::Io { path, .. } => Some(path),
            DefError::DefinitionSyntax { file, .. }
            | DefError::UnknownType { file, .. }
            | DefError::CyclicImport { file, .. }
            | DefError::WidthTooSmall { file, .. }
            | DefError::SqueezeOverflow { file, .. }
            | DefError::UnsupportedArrayElement { file, .. }
            | DefError::SizeBudgetExceeded { file, .. }
            | DefError::DuplicateName { file, .. }
            | DefError::KindMismatch { file, .. } => Some(file),
            DefError::DuplicateDefinition { second, .. } => Some(second),
            DefError::Json(_) => None,
        }
    }

    /// Offending line, `None` for file-level failures.
    pub fn line(&self) -> Option<usize> {
        match self {
            DefError::DefinitionSyntax { line, .. }
            | DefError::UnknownType { line, .. }
            | DefError::CyclicImport { line, .. }
            | DefError::WidthTooSmall { line, .. }
            | DefError::SqueezeOverflow { line, .. }
            | DefError::UnsupportedArrayElement { line, .. }
            | DefError::DuplicateName { line, .. }
            | DefError::KindMismatch { line, .. } => Some(*line),
            _ => None,
        }
    }
}
