use std::path::{Path, PathBuf};

use defc_schema::{DefId, Definition, DefinitionKind};
use tracing::info;

use crate::{
    error::DefError,
    registry::{Registry, DEFAULT_MAX_SIZE},
    source::FsSource,
    traits::SourceProvider,
    utils::{error, quote},
};

/// Settings of one compilation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Directory every definition and import path is relative to.
    pub root:             PathBuf,
    /// `max_size` recorded for tables that do not declare one; `0` is unbounded.
    pub default_max_size: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            root:             PathBuf::from("."),
            default_max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// The outcome of a successful run: the registry and the requested roots.
pub struct Compilation {
    registry: Registry,
    roots:    Vec<DefId>,
}

impl Compilation {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn roots(&self) -> &[DefId] {
        &self.roots
    }

    pub fn root_definitions(&self) -> impl Iterator<Item = &Definition> {
        self.roots.iter().map(|id| &self.registry[*id])
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

/// Definition kind named by a file's extension.
pub fn kind_for_path(path: &Path) -> Result<DefinitionKind, DefError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    DefinitionKind::from_extension(ext).ok_or_else(|| {
        error(
            &path.display().to_string(),
            0,
            &format!("Unknown definition extension {}", quote(ext)),
        )
    })
}

/// Compiles `files` (relative to `options.root`) from disk.
pub fn compile_files<P: AsRef<Path>>(options: &CompileOptions, files: &[P]) -> Result<Compilation, DefError> {
    compile_with(FsSource::new(&options.root), options, files)
}

/// Compiles `files` read through an arbitrary source. `options.root` is not consulted.
pub fn compile_with<S, P>(source: S, options: &CompileOptions, files: &[P]) -> Result<Compilation, DefError>
where
    S: SourceProvider + 'static,
    P: AsRef<Path>,
{
    let mut registry = Registry::new(source).with_default_max_size(options.default_max_size);
    let mut roots    = Vec::with_capacity(files.len());

    for file in files {
        let path = file.as_ref();
        let kind = kind_for_path(path)?;
        let id   = registry.resolve(kind, path)?;
        if !roots.contains(&id) {
            roots.push(id);
        }
    }

    info!(roots = roots.len(), definitions = registry.len(), "compilation finished");
    Ok(Compilation { registry, roots })
}
