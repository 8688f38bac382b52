use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use defc_schema::DefinitionKind;

use crate::error::DefError;
use crate::traits::SourceProvider;
use crate::types::{SourceFile, SourceLine};
use crate::utils::{error, is_identifier, quote, strip_comment};

/// Reads definitions from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> FsSource {
        FsSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceProvider for FsSource {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        fs::read_to_string(self.root.join(path))
    }

    fn display(&self, path: &Path) -> String {
        self.root.join(path).display().to_string()
    }
}

/// Definitions held in memory, keyed by their relative path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> MemorySource {
        MemorySource::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(path.as_ref().to_path_buf(), text.into());
    }

    pub fn with(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> MemorySource {
        self.insert(path, text);
        self
    }
}

impl SourceProvider for MemorySource {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no definition at {}", path.display()),
            )
        })
    }
}

/// Folds `.` and `..` out of a root-relative path. Absolute paths and paths
/// escaping the root are rejected.
pub fn normalize_path(path: &Path) -> Result<PathBuf, String> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(format!("{} escapes the definition root", path.display()));
                }
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("{} must be relative to the definition root", path.display()));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err("empty definition path".to_string());
    }
    Ok(out)
}

/// Splits definition text into documentation, header and body.
///
/// Comment lines and blank lines never reach the header or the body, and a
/// trailing `# comment` is stripped from the lines that do. A line made of a
/// single `-` separates sections; up to two are allowed.
pub fn read_definition(path: &Path, display: &str, text: &str) -> Result<SourceFile, DefError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    if !is_identifier(&name) {
        return Err(error(
            display,
            0,
            &format!("Definition name {} is not an identifier", quote(&name)),
        ));
    }
    if name == "import" || DefinitionKind::from_tag(&name).is_some() {
        return Err(error(
            display,
            0,
            &format!("Definition name {} is reserved for import directives", quote(&name)),
        ));
    }

    let mut sections: Vec<Vec<SourceLine>> = vec![Vec::new()];
    for (idx, raw) in text.lines().enumerate() {
        let number  = idx + 1;
        let trimmed = raw.trim();

        if trimmed.starts_with('#') {
            continue;
        }
        if trimmed == "-" {
            if sections.len() == 3 {
                return Err(error(display, number, "A definition has at most two separators"));
            }
            sections.push(Vec::new());
            continue;
        }
        if let Some(current) = sections.last_mut() {
            current.push(SourceLine { number, text: raw.trim_end().to_string() });
        }
    }

    let mut sections = sections.into_iter();
    let (doc, header, body) = match sections.len() {
        1 => (Vec::new(), Vec::new(), sections.next().unwrap_or_default()),
        2 => {
            let doc = sections.next().unwrap_or_default();
            (doc, Vec::new(), sections.next().unwrap_or_default())
        }
        _ => {
            let doc    = sections.next().unwrap_or_default();
            let header = sections.next().unwrap_or_default();
            (doc, header, sections.next().unwrap_or_default())
        }
    };

    let doc = doc
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Ok(SourceFile {
        path: path.to_path_buf(),
        display: display.to_string(),
        name,
        doc,
        header: meaningful(header),
        body: meaningful(body),
    })
}

fn meaningful(lines: Vec<SourceLine>) -> Vec<SourceLine> {
    lines
        .into_iter()
        .filter_map(|line| {
            let text = strip_comment(&line.text);
            if text.is_empty() {
                None
            } else {
                Some(SourceLine { number: line.number, text: text.to_string() })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> SourceFile {
        read_definition(Path::new("a/Thing.thx"), "a/Thing.thx", text).unwrap()
    }

    #[test]
    fn test_body_only() {
        let file = read("# header comment\nuint8_t a\n\nuint16_t b  # trailing\n");
        assert_eq!(file.name, "Thing");
        assert!(file.doc.is_empty());
        assert!(file.header.is_empty());
        assert_eq!(
            file.body,
            vec![
                SourceLine { number: 2, text: "uint8_t a".into() },
                SourceLine { number: 4, text: "uint16_t b".into() },
            ]
        );
    }

    #[test]
    fn test_doc_and_body() {
        let file = read("A thing.\nSecond line.\n-\nuint8_t a\n");
        assert_eq!(file.doc, "A thing.\nSecond line.");
        assert!(file.header.is_empty());
        assert_eq!(file.body.len(), 1);
        assert_eq!(file.body[0].number, 4);
    }

    #[test]
    fn test_three_sections() {
        let file = read("Doc\n-\nenum e/Color.the\n-\nColor color\n");
        assert_eq!(file.doc, "Doc");
        assert_eq!(file.header[0].text, "enum e/Color.the");
        assert_eq!(file.header[0].number, 3);
        assert_eq!(file.body[0].text, "Color color");
    }

    #[test]
    fn test_third_separator_rejected() {
        let err = read_definition(Path::new("T.thx"), "T.thx", "-\n-\n-\n").unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_name_must_be_identifier() {
        assert!(read_definition(Path::new("my-thing.thx"), "my-thing.thx", "").is_err());
    }

    #[test]
    fn test_import_tags_are_not_names() {
        for name in ["table", "record", "sqx", "bit", "bitfield", "enum", "protocol", "import"] {
            let path = format!("db/{}.tbx", name);
            let err = read_definition(Path::new(&path), &path, "uint8_t x\n").unwrap_err();
            assert!(matches!(err, DefError::DefinitionSyntax { line: 0, .. }), "{}", name);
        }
        assert!(read_definition(Path::new("Table.tbx"), "Table.tbx", "uint8_t x\n").is_ok());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("./a/../b/C.the")).unwrap(), PathBuf::from("b/C.the"));
        assert!(normalize_path(Path::new("../C.the")).is_err());
        assert!(normalize_path(Path::new("/abs/C.the")).is_err());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with("x/A.the", "ONE\n");
        assert_eq!(source.read(Path::new("x/A.the")).unwrap(), "ONE\n");
        assert_eq!(
            source.read(Path::new("x/B.the")).unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );
    }
}
