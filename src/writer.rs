//! The graph writer (component F): the coordinator's only path to the store
//! for file-scoped batches and Pass 2's global link report.
//!
//! Grounded on the teacher's `indexing/transaction.rs` snapshot/commit shape
//! and `storage/persistence.rs` write-temp-then-rename pattern, both already
//! folded into [`crate::store`] itself; this module is the thin seam that
//! turns extraction/linking output into store calls with the right error
//! context attached.

use crate::error::WriteError;
use crate::linking::LinkReport;
use crate::model::{Batch, EntityId};
use crate::store::GraphStore;

/// Default chunk size for the Pass-2 linker's `calls` edges (§4.F): a run
/// over a large codebase can produce far more call edges than a single
/// batch should carry through the store's write lock at once.
pub const CALLS_CHUNK_SIZE: usize = 100;

/// Apply one file's batch: the store deletes whatever this file previously
/// owned and inserts the new rows, atomically with respect to readers.
pub fn write_file(store: &GraphStore, batch: Batch) -> Result<(), WriteError> {
    let file_id = batch.file_id.clone().unwrap_or_else(|| EntityId::from_raw("<unknown>"));
    store.write_batch(batch).map_err(|source| {
        tracing::warn!(target: "writer", "failed to write batch for {}: {source}", file_id.as_str());
        WriteError::Store { file_id, source }
    })
}

/// Delete everything a file owns (used by the incremental updater's
/// `deleted` bucket).
pub fn delete_file(store: &GraphStore, file_id: &EntityId) -> Result<(), WriteError> {
    store.delete_file(file_id).map_err(|source| {
        tracing::warn!(target: "writer", "failed to delete file {}: {source}", file_id.as_str());
        WriteError::Store { file_id: file_id.clone(), source }
    })
}

/// Write Pass 2's global link report, chunking the `calls` edges into
/// batches of [`CALLS_CHUNK_SIZE`] so one oversized run doesn't hold the
/// store's write lock for a single enormous batch. Ghosts and the non-call
/// edges ride along with the first chunk.
pub fn write_link_report(store: &GraphStore, report: LinkReport) -> Result<(), WriteError> {
    let mut batch = report.batch;
    let calls = std::mem::take(&mut batch.calls);
    let mut chunks = calls.chunks(CALLS_CHUNK_SIZE);

    if let Some(first) = chunks.next() {
        batch.calls = first.to_vec();
    }
    write_global(store, batch)?;

    for chunk in chunks {
        let mut chunk_batch = Batch::global();
        chunk_batch.calls = chunk.to_vec();
        write_global(store, chunk_batch)?;
    }
    Ok(())
}

fn write_global(store: &GraphStore, batch: Batch) -> Result<(), WriteError> {
    store
        .write_batch(batch)
        .map_err(|source| WriteError::Store { file_id: EntityId::from_raw("<global>"), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{mint_file, CallsEdge, FileRow, Language};
    use tempfile::tempdir;

    fn file_row(path: &str) -> FileRow {
        FileRow {
            id: mint_file(path),
            absolute_path: path.into(),
            relative_path: path.to_string(),
            extension: "ts".to_string(),
            content_hash: "h".to_string(),
            size_bytes: 0,
            mtime_unix: 0,
            language: Language::TypeScript,
            framework: None,
        }
    }

    #[test]
    fn write_file_then_delete_file_leaves_store_empty() {
        let dir = tempdir().unwrap();
        let store = GraphStore::new(dir.path());
        store.initialize().unwrap();

        let file_id = mint_file("a.ts");
        let mut batch = Batch::for_file(file_id.clone());
        batch.files.push(file_row("a.ts"));
        write_file(&store, batch).unwrap();

        let rows = store
            .query("MATCH (f:File) RETURN f.relative_path", &crate::store::query::Params::new())
            .unwrap();
        assert_eq!(rows.len(), 1);

        delete_file(&store, &file_id).unwrap();
        let rows = store
            .query("MATCH (f:File) RETURN f.relative_path", &crate::store::query::Params::new())
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn write_link_report_chunks_calls_edges() {
        let dir = tempdir().unwrap();
        let store = GraphStore::new(dir.path());
        store.initialize().unwrap();

        let caller = mint_file("caller.ts");
        let mut report = LinkReport {
            batch: Batch::global(),
            resolved: 250,
            ..Default::default()
        };
        for i in 0..250u32 {
            report.batch.calls.push(CallsEdge {
                from: caller.clone(),
                to: mint_file(&format!("callee{i}.ts")),
                line: i,
                direct: true,
                awaited: false,
            });
        }

        write_link_report(&store, report).unwrap();

        let rows = store
            .query("MATCH (f:Function)-[:CALLS]->(g:Function) RETURN f.name", &crate::store::query::Params::new())
            .unwrap();
        // The stub calls reference File ids, not Function ids, so the typed
        // query above matches nothing; what matters is that writing 250
        // edges across 3 chunks does not error.
        assert!(rows.is_empty());
    }
}
