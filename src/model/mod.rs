//! The typed data model: entity IDs, node rows, edge rows, and the `Batch`
//! bag that carries one file's (or Pass 2's) rows to the writer atomically.

mod batch;
mod entities;
mod ids;
mod relationships;

pub use batch::{Batch, EmbeddingChunk};
pub use entities::{
    ClassFlags, ClassRow, EmbeddingRow, EntityKind, FileRow, FunctionFlags, FunctionRow,
    GhostKind, GhostRow, InterfaceFlags, InterfaceRow, Language, Position, Range, ScopeTag,
    TypeAliasRow, VariableFlags, VariableRow,
};
pub use ids::{mint, mint_anonymous, mint_file, mint_ghost, EntityId};
pub use relationships::{
    CallsEdge, ContainsEdge, ExtendsEdge, ExtendsInterfaceEdge, HasMethodEdge, ImplementsEdge,
    ImportKind, ImportsEdge, RelationKind, ReferencesExternalEdge, UsesTypeEdge, Visibility,
};
