//! defc
//!
//! Entry point for emitters working with compiled definitions.
//!
//! - Compilation (`compile_files`, `compile_with`) re-exported from the compiler
//! - The layout IR re-exported from `defc-schema`
//! - JSON rendering of the IR

pub use defc_compiler::{
    compile_files, compile_with, kind_for_path, Compilation, CompileOptions, DefError, FsSource,
    MemorySource, Registry, SourceProvider, DEFAULT_MAX_SIZE,
};
pub use defc_schema::*;

/// Renders every definition of a run as pretty JSON, dependencies first.
pub fn to_json(compilation: &Compilation) -> Result<String, DefError> {
    Ok(serde_json::to_string_pretty(compilation.registry().definitions())?)
}

/// Renders a single definition as pretty JSON.
pub fn definition_to_json(definition: &Definition) -> Result<String, DefError> {
    Ok(serde_json::to_string_pretty(definition)?)
}

/// Names of the records to create, in order, before `root` can be created.
pub fn creation_order_names(registry: &Registry, root: DefId) -> Vec<String> {
    registry
        .creation_order(root)
        .into_iter()
        .map(|id| registry[id].name.clone())
        .collect()
}

pub mod error {
    pub use defc_compiler::error::DefError;
}

pub mod schema {
    pub use defc_schema::*;
}
