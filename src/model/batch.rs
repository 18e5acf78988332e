//! The `Batch` type: a bag of typed row vectors for every relation, carrying
//! everything that must be written atomically for one file (or, for Pass 2's
//! output, the resolved `calls`/`references_external` edges for a whole run).

use serde::{Deserialize, Serialize};

use super::entities::*;
use super::relationships::*;
use super::EntityId;

/// A text passage queued for embedding, plus enough context to write the
/// resulting vector back to the right `EntityEmbedding` row once the
/// embedding producer (an external collaborator) returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub entity_id: EntityId,
    pub file_id: EntityId,
    pub text: String,
}

/// A bag of typed row vectors for every node/edge relation. `file_id` is
/// `Some` for a per-file Pass-1 batch (the writer deletes-then-inserts keyed
/// on this ID) and `None` for the Pass-2 linker's global batch, which only
/// ever appends `calls` / `references_external` / `ghosts` rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    pub file_id: Option<EntityId>,

    pub files: Vec<FileRow>,
    pub functions: Vec<FunctionRow>,
    pub classes: Vec<ClassRow>,
    pub interfaces: Vec<InterfaceRow>,
    pub type_aliases: Vec<TypeAliasRow>,
    pub variables: Vec<VariableRow>,
    pub ghosts: Vec<GhostRow>,

    pub contains: Vec<ContainsEdge>,
    pub calls: Vec<CallsEdge>,
    pub imports: Vec<ImportsEdge>,
    pub extends: Vec<ExtendsEdge>,
    pub implements: Vec<ImplementsEdge>,
    pub extends_interface: Vec<ExtendsInterfaceEdge>,
    pub has_method: Vec<HasMethodEdge>,
    pub uses_type: Vec<UsesTypeEdge>,
    pub references_external: Vec<ReferencesExternalEdge>,

    pub embeddings: Vec<EmbeddingRow>,
    pub embedding_chunks: Vec<EmbeddingChunk>,
}

impl Batch {
    pub fn for_file(file_id: EntityId) -> Self {
        Self {
            file_id: Some(file_id),
            ..Default::default()
        }
    }

    /// A batch with no file scope, used for Pass 2's linker output and for
    /// the coordinator's cross-run summaries.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.functions.is_empty()
            && self.classes.is_empty()
            && self.interfaces.is_empty()
            && self.type_aliases.is_empty()
            && self.variables.is_empty()
            && self.ghosts.is_empty()
            && self.contains.is_empty()
            && self.calls.is_empty()
            && self.imports.is_empty()
            && self.extends.is_empty()
            && self.implements.is_empty()
            && self.extends_interface.is_empty()
            && self.has_method.is_empty()
            && self.uses_type.is_empty()
            && self.references_external.is_empty()
            && self.embeddings.is_empty()
    }

    /// Total entity row count, used for progress/summary reporting.
    pub fn entity_count(&self) -> usize {
        self.files.len()
            + self.functions.len()
            + self.classes.len()
            + self.interfaces.len()
            + self.type_aliases.len()
            + self.variables.len()
            + self.ghosts.len()
    }

    /// Total relationship row count, used for progress/summary reporting.
    pub fn relationship_count(&self) -> usize {
        self.contains.len()
            + self.calls.len()
            + self.imports.len()
            + self.extends.len()
            + self.implements.len()
            + self.extends_interface.len()
            + self.has_method.len()
            + self.uses_type.len()
            + self.references_external.len()
    }

    /// Merge another batch's rows into this one. Used by the coordinator to
    /// fold the linker's global batch into the run's total counts.
    pub fn merge(&mut self, mut other: Batch) {
        self.files.append(&mut other.files);
        self.functions.append(&mut other.functions);
        self.classes.append(&mut other.classes);
        self.interfaces.append(&mut other.interfaces);
        self.type_aliases.append(&mut other.type_aliases);
        self.variables.append(&mut other.variables);
        self.ghosts.append(&mut other.ghosts);
        self.contains.append(&mut other.contains);
        self.calls.append(&mut other.calls);
        self.imports.append(&mut other.imports);
        self.extends.append(&mut other.extends);
        self.implements.append(&mut other.implements);
        self.extends_interface.append(&mut other.extends_interface);
        self.has_method.append(&mut other.has_method);
        self.uses_type.append(&mut other.uses_type);
        self.references_external.append(&mut other.references_external);
        self.embeddings.append(&mut other.embeddings);
        self.embedding_chunks.append(&mut other.embedding_chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_batch_is_empty() {
        let batch = Batch::for_file(EntityId::from_raw("file::a.rs"));
        assert!(batch.is_empty());
        assert_eq!(batch.entity_count(), 0);
        assert_eq!(batch.relationship_count(), 0);
    }

    #[test]
    fn merge_combines_counts() {
        let mut a = Batch::for_file(EntityId::from_raw("file::a.rs"));
        a.files.push(FileRow {
            id: EntityId::from_raw("file::a.rs"),
            absolute_path: "/a.rs".into(),
            relative_path: "a.rs".into(),
            extension: "rs".into(),
            content_hash: "deadbeef".into(),
            size_bytes: 10,
            mtime_unix: 0,
            language: Language::Rust,
            framework: None,
        });
        let b = Batch::global();
        a.merge(b);
        assert_eq!(a.entity_count(), 1);
    }
}
