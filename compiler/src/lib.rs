//! defc-compiler
//!
//! This crate implements:
//!  1) A line reader splitting definition files into doc, header and body,
//!  2) One line parser per definition kind (enum, bitfield, protocol, table, record),
//!  3) The type registry resolving imports (memoized by path, cycle checked),
//!  4) The layout engine (widths, offsets, vtable slots, creation order),
//!  5) Error types (`DefError`) and the `SourceProvider` trait.

pub mod error;
pub mod types;
pub mod utils;
pub mod source;
pub mod parser;
pub mod layout;
pub mod registry;
pub mod compiler;
pub mod traits;

pub use compiler::{compile_files, compile_with, kind_for_path, Compilation, CompileOptions};
pub use error::DefError;
pub use registry::{Registry, DEFAULT_MAX_SIZE};
pub use source::{FsSource, MemorySource};
pub use traits::SourceProvider;
