//! Entity and relationship extraction (component D): walks a parsed file
//! and emits a typed [`Batch`](crate::model::Batch) plus everything Pass 2
//! needs to resolve this file's cross-file references.

pub mod complexity;
pub mod file_resolver;
pub mod pipeline;
pub mod scan;

pub use file_resolver::{FileResolver, ResolvedImport};
pub use pipeline::{extract_file, AliasTarget, ExtractionOutput, UnresolvedKind, UnresolvedReference};
