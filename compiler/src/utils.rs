use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DefError;

lazy_static! {
    pub static ref IDENTIFIER:  Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    // "IDTest" -> I[D][Te]st
    static ref UPPER_TO_LOWER:  Regex = Regex::new(r"([^_\s])([A-Z][a-z])").unwrap();
    // "testID" -> tes[t][I]D
    static ref LOWER_TO_UPPER:  Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
}

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(file: &str, line: usize, msg: &str) -> DefError {
    DefError::DefinitionSyntax {
        file:   file.to_string(),
        line,
        reason: msg.to_string(),
    }
}

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// Converts CamelCase or camelCase to snake_case, keeping acronyms together.
pub fn to_snake_case(text: &str) -> String {
    let split = UPPER_TO_LOWER.replace_all(text, "${1}_${2}");
    LOWER_TO_UPPER.replace_all(&split, "${1}_${2}").to_lowercase()
}

/// Drops a trailing `# comment` and surrounding whitespace.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}
