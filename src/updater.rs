//! The incremental updater (component G): diffs the files this run observed
//! against the store's previously recorded file rows, into the four buckets
//! the coordinator's incremental path drives off.
//!
//! Grounded on the teacher's `indexing/file_info.rs` (`calculate_hash`,
//! `FileInfo`) and the `DataSource`/`IndexMetadata` bookkeeping in
//! `storage/metadata.rs` for tracking "what's already in the store" between
//! runs — generalized here to a pure diff function over two small row types
//! rather than a stateful metadata store.

use std::collections::{HashMap, HashSet};

use crate::model::{EntityId, FileRow};
use crate::scanner::FileDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    pub file_id: EntityId,
    pub relative_path: String,
    pub content_hash: String,
}

impl ObservedFile {
    pub fn from_descriptor(descriptor: &FileDescriptor) -> Self {
        Self {
            file_id: descriptor.id.clone(),
            relative_path: descriptor.relative_path.clone(),
            content_hash: descriptor.content_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_id: EntityId,
    pub relative_path: String,
    pub content_hash: String,
}

impl StoredFile {
    pub fn from_file_row(row: &FileRow) -> Self {
        Self {
            file_id: row.id.clone(),
            relative_path: row.relative_path.clone(),
            content_hash: row.content_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<ObservedFile>,
    pub modified: Vec<ObservedFile>,
    pub deleted: Vec<StoredFile>,
    pub unchanged: Vec<ObservedFile>,
}

/// Diff `observed` (this run's scan) against `stored` (the store's current
/// file rows). A file is `modified` when its id matches a stored row but the
/// content hash differs; `added` when its id has no stored counterpart;
/// `deleted` when a stored id has no observed counterpart; `unchanged`
/// otherwise.
///
/// File ids are minted from their relative path (see `model::ids::mint_file`),
/// so a rename with unchanged content surfaces as one `deleted` plus one
/// `added` rather than a `modified` — the identifier, not the content, is
/// what the diff keys on.
pub fn diff(observed: &[ObservedFile], stored: &[StoredFile]) -> DiffResult {
    let stored_by_id: HashMap<&EntityId, &StoredFile> = stored.iter().map(|s| (&s.file_id, s)).collect();
    let observed_ids: HashSet<&EntityId> = observed.iter().map(|o| &o.file_id).collect();

    let mut result = DiffResult::default();
    for file in observed {
        match stored_by_id.get(&file.file_id) {
            None => result.added.push(file.clone()),
            Some(prior) if prior.content_hash != file.content_hash => result.modified.push(file.clone()),
            Some(_) => result.unchanged.push(file.clone()),
        }
    }
    for file in stored {
        if !observed_ids.contains(&file.file_id) {
            result.deleted.push(file.clone());
        }
    }
    result
}
