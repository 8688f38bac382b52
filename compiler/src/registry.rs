use std::collections::HashMap;
use std::ops::Index;
use std::path::{Path, PathBuf};

use defc_schema::{DefId, Definition, DefinitionKind};
use tracing::debug;

use crate::error::DefError;
use crate::layout::post_order;
use crate::parser::parse_definition;
use crate::source::{normalize_path, read_definition};
use crate::traits::SourceProvider;
use crate::types::SourceFile;
use crate::utils::error;

/// Table `max_size` used when a table does not declare one.
pub const DEFAULT_MAX_SIZE: u32 = 500;

/// Owns every definition of one compilation run.
///
/// Definitions are memoized by their normalized path: resolving a path a
/// second time hands back the same [`DefId`]. Ids are handed out once a
/// definition and all of its imports are complete, so an id is always larger
/// than the ids of everything it imports.
pub struct Registry {
    source:           Box<dyn SourceProvider>,
    default_max_size: u32,
    definitions:      Vec<Definition>,
    by_path:          HashMap<PathBuf, DefId>,
    by_name:          HashMap<String, DefId>,
    in_progress:      Vec<PathBuf>,
}

impl Registry {
    pub fn new(source: impl SourceProvider + 'static) -> Registry {
        Registry {
            source:           Box::new(source),
            default_max_size: DEFAULT_MAX_SIZE,
            definitions:      Vec::new(),
            by_path:          HashMap::new(),
            by_name:          HashMap::new(),
            in_progress:      Vec::new(),
        }
    }

    /// `0` leaves tables without a `max_size` line unbounded.
    pub fn with_default_max_size(mut self, max_size: u32) -> Registry {
        self.default_max_size = max_size;
        self
    }

    pub fn default_max_size(&self) -> u32 {
        self.default_max_size
    }

    /// Resolves a root definition.
    pub fn resolve(&mut self, kind: DefinitionKind, path: impl AsRef<Path>) -> Result<DefId, DefError> {
        let path   = path.as_ref();
        let origin = self.source.display(path);
        self.load(kind, path, &origin, 0)
    }

    /// Resolves a definition imported by `importer` at `line`.
    pub(crate) fn resolve_import(
        &mut self,
        kind: DefinitionKind,
        path: &Path,
        importer: &SourceFile,
        line: usize,
    ) -> Result<DefId, DefError> {
        self.load(kind, path, &importer.display, line)
    }

    fn load(&mut self, kind: DefinitionKind, path: &Path, origin: &str, line: usize) -> Result<DefId, DefError> {
        let path = normalize_path(path).map_err(|reason| error(origin, line, &reason))?;

        // 1) A path still being parsed means the imports loop back on themselves
        if let Some(pos) = self.in_progress.iter().position(|p| *p == path) {
            let mut chain: Vec<String> = self.in_progress[pos..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(DefError::CyclicImport {
                file: origin.to_string(),
                line,
                chain,
            });
        }

        // 2) The extension, when it names a kind, must agree with the request
        if let Some(actual) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DefinitionKind::from_extension)
        {
            if actual != kind {
                return Err(kind_mismatch(origin, line, &path, kind, actual));
            }
        }

        // 3) Memoized
        if let Some(&id) = self.by_path.get(&path) {
            let actual = self.definitions[id.0].kind();
            if actual != kind {
                return Err(kind_mismatch(origin, line, &path, kind, actual));
            }
            debug!(path = %path.display(), %id, "definition served from cache");
            return Ok(id);
        }

        // 4) Read, parse and lay out, depth first through the imports
        let shown = self.source.display(&path);
        let text = self
            .source
            .read(&path)
            .map_err(|source| DefError::Io { path: shown.clone(), source })?;
        let file = read_definition(&path, &shown, &text)?;
        self.check_name(&file)?;

        self.in_progress.push(path.clone());
        let parsed = parse_definition(kind, &file, self);
        self.in_progress.pop();
        let (body, imports) = parsed?;

        // a nested import may have claimed the name meanwhile
        self.check_name(&file)?;

        let id = DefId(self.definitions.len());
        debug!(path = %file.display, name = %file.name, %kind, %id, "definition parsed");
        self.by_path.insert(path.clone(), id);
        self.by_name.insert(file.name.clone(), id);
        self.definitions.push(Definition {
            id,
            name: file.name,
            path,
            doc: file.doc,
            imports,
            body,
        });
        Ok(id)
    }

    fn check_name(&self, file: &SourceFile) -> Result<(), DefError> {
        match self.by_name.get(&file.name) {
            Some(&id) => Err(DefError::DuplicateDefinition {
                name:   file.name.clone(),
                first:  self.source.display(&self.definitions[id.0].path),
                second: file.display.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn get(&self, id: DefId) -> Option<&Definition> {
        self.definitions.get(id.0)
    }

    /// Finds a definition by its name.
    pub fn lookup(&self, name: &str) -> Option<&Definition> {
        self.by_name.get(name).map(|id| &self.definitions[id.0])
    }

    /// Id of the definition loaded from `path`, if any.
    pub fn find_path(&self, path: impl AsRef<Path>) -> Option<DefId> {
        let path = normalize_path(path.as_ref()).ok()?;
        self.by_path.get(&path).copied()
    }

    /// All definitions, dependencies before their dependents.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Everything `id` imports directly or transitively, dependencies first.
    /// `id` itself is not part of the result.
    pub fn import_closure(&self, id: DefId) -> Vec<DefId> {
        let mut order = post_order(id, |d| self.definitions[d.0].imports.clone());
        order.pop();
        order
    }

    /// Records to create so that every foreign key target exists before the
    /// record referencing it, ending with `id` itself.
    pub fn creation_order(&self, id: DefId) -> Vec<DefId> {
        post_order(id, |d| {
            self.definitions[d.0]
                .as_record()
                .map(|r| r.references.clone())
                .unwrap_or_default()
        })
    }
}

fn kind_mismatch(
    origin: &str,
    line: usize,
    path: &Path,
    expected: DefinitionKind,
    actual: DefinitionKind,
) -> DefError {
    DefError::KindMismatch {
        file: origin.to_string(),
        line,
        path: path.display().to_string(),
        expected,
        actual,
    }
}

impl Index<DefId> for Registry {
    type Output = Definition;

    fn index(&self, id: DefId) -> &Definition {
        &self.definitions[id.0]
    }
}
