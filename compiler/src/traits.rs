use std::path::Path;

/// Where definition text comes from. Paths are relative to the provider's root.
pub trait SourceProvider {
    /// Reads the whole file. Implementations must not keep it open afterwards.
    fn read(&self, path: &Path) -> std::io::Result<String>;

    /// Spelling of `path` used in diagnostics.
    fn display(&self, path: &Path) -> String {
        path.display().to_string()
    }
}
