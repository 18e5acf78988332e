//! The indexer coordinator (component I): orchestrates scan → parse →
//! extract → embed → write across a bounded worker pool, runs Pass 2 once
//! every Pass-1 write of the run has landed, and reports progress/errors
//! through a small sink trait so embedders (CLI, a future MCP surface) don't
//! pull the coordinator toward a concrete UI.
//!
//! Grounded on the teacher's `indexing/pipeline/mod.rs` orchestration shape
//! (scan → phase-tagged stages → summary) and `indexing/progress.rs`
//! (`IndexStats`), simplified from its five-stage `crossbeam-channel`
//! pipeline to a `rayon` scoped pool per the per-file synchronous pipeline
//! this system's concurrency unit calls for (see DESIGN.md).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::embedding_contract::EmbeddingGenerator;
use crate::error::{CoordinatorError, CoordinatorResult, IndexingError, Phase, StoreError, WriteError};
use crate::extraction::{extract_file, ExtractionOutput, FileResolver};
use crate::linking::{build_registry, link, LinkReport};
use crate::model::{Batch, EmbeddingChunk, EmbeddingRow, EntityId, FileRow};
use crate::parser_contract::SyntaxParser;
use crate::scanner::{scan, FileDescriptor, ScanOptions};
use crate::store::GraphStore;
use crate::updater::{diff, ObservedFile, StoredFile};
use crate::writer;

/// Tunables for a coordinator run (§4.I).
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Bounded worker count `C`.
    pub concurrency: usize,
    /// File batch size handed to each wave of the worker pool.
    pub batch_size: usize,
    /// When true, a recoverable per-file error is collected and the run
    /// continues; when false, the coordinator stops dispatching new files
    /// once any error has been recorded (in-flight files still finish).
    pub continue_on_error: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            batch_size: 10,
            continue_on_error: true,
        }
    }
}

/// One progress update, matching §4.I's event shape.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    pub percentage: f32,
    pub message: String,
}

/// A teacher-style small trait object (analogous to `indexing/progress.rs`'s
/// `IndexStats`) so the coordinator never depends on a concrete UI.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
    fn on_error(&self, error: IndexingError);
}

/// A sink that discards every event — the default for callers that only
/// want the final [`IndexSummary`].
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _event: ProgressEvent) {}
    fn on_error(&self, _error: IndexingError) {}
}

/// Terminal result of a coordinator run.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub success: bool,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub entities_written: usize,
    pub relationships_written: usize,
    pub duration_ms: u64,
    pub errors: Vec<IndexingError>,
    pub phase_stats: Vec<(Phase, usize)>,
}

#[derive(Debug, Clone, Default)]
struct PartialStats {
    files_indexed: usize,
    files_failed: usize,
    entities: usize,
    relationships: usize,
    errors: Vec<IndexingError>,
}

/// Orchestrates one indexing run (full or incremental) over `store`.
pub struct Coordinator<'a> {
    config: CoordinatorConfig,
    parser: &'a dyn SyntaxParser,
    embedder: Option<&'a dyn EmbeddingGenerator>,
    store: &'a GraphStore,
    progress: &'a dyn ProgressSink,
    cancel: Arc<AtomicBool>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        config: CoordinatorConfig,
        parser: &'a dyn SyntaxParser,
        embedder: Option<&'a dyn EmbeddingGenerator>,
        store: &'a GraphStore,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            config,
            parser,
            embedder,
            store,
            progress,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable cancellation handle. Setting it stops new files from
    /// being dispatched; in-flight files finish or abort at their next
    /// suspension point.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Full-index operation (§4.I): scan the whole project, process every
    /// file, then run Pass 2 over this run's results alone.
    pub fn run_full_index(&self, root: &Path, scan_options: &ScanOptions) -> CoordinatorResult<IndexSummary> {
        let start = Instant::now();
        let report = scan(root, scan_options)?;
        tracing::info!(target: "coordinator", "full index: scanned {} files under {}", report.files.len(), root.display());
        self.emit_progress(Phase::Scanning, report.files.len(), report.files.len(), "scan complete");

        let resolver = FileResolver::new(&file_rows(&report.files));
        let (outputs, partial) = self.process_files(&report.files, &resolver);

        if self.is_cancelled() {
            tracing::warn!(target: "coordinator", "full index cancelled after {} files", partial.files_indexed);
            return Ok(self.cancelled_summary(start, partial));
        }

        let registry = build_registry(&outputs, &[]);
        let link_report = link(&outputs, &registry);
        tracing::info!(
            target: "coordinator",
            "pass 2: {} resolved, {} external, {} dropped",
            link_report.resolved, link_report.external, link_report.dropped
        );
        self.finish_run(start, report.files.len(), outputs, partial, link_report)
    }

    /// Incremental operation (§4.I): diff the scan against the store's
    /// current file rows, delete what's gone, re-extract only
    /// `added ∪ modified`, and build Pass 2's registry from the union of
    /// this run's fresh exports and the store's exports for every file this
    /// run did not touch.
    pub fn run_incremental_index(&self, root: &Path, scan_options: &ScanOptions) -> CoordinatorResult<IndexSummary> {
        let start = Instant::now();
        let report = scan(root, scan_options)?;

        let observed: Vec<ObservedFile> = report.files.iter().map(ObservedFile::from_descriptor).collect();
        let stored: Vec<StoredFile> = self.store.file_rows()?.iter().map(StoredFile::from_file_row).collect();
        let delta = diff(&observed, &stored);
        tracing::info!(
            target: "coordinator",
            "incremental diff: {} added, {} modified, {} deleted, {} unchanged",
            delta.added.len(), delta.modified.len(), delta.deleted.len(), delta.unchanged.len()
        );

        let mut partial = PartialStats::default();
        for deleted in &delta.deleted {
            if let Err(e) = writer::delete_file(self.store, &deleted.file_id) {
                tracing::warn!(target: "coordinator", "failed to delete {}: {e}", deleted.relative_path);
                partial.errors.push(IndexingError {
                    file_path: PathBuf::from(&deleted.relative_path),
                    phase: Phase::Writing,
                    message: e.to_string(),
                    recoverable: true,
                });
            }
        }

        let changed_ids: std::collections::HashSet<EntityId> = delta
            .added
            .iter()
            .chain(&delta.modified)
            .map(|f| f.file_id.clone())
            .collect();
        let changed_files: Vec<FileDescriptor> =
            report.files.iter().filter(|f| changed_ids.contains(&f.id)).cloned().collect();

        let resolver = FileResolver::new(&file_rows(&report.files));
        let (outputs, run_stats) = self.process_files(&changed_files, &resolver);
        partial.files_indexed += run_stats.files_indexed;
        partial.files_failed += run_stats.files_failed;
        partial.entities += run_stats.entities;
        partial.relationships += run_stats.relationships;
        partial.errors.extend(run_stats.errors);

        if self.is_cancelled() {
            tracing::warn!(target: "coordinator", "incremental index cancelled after {} files", partial.files_indexed);
            return Ok(self.cancelled_summary(start, partial));
        }

        let mut prior_exports = self.store.exported_symbols()?;
        prior_exports.retain(|entry| !changed_ids.contains(&entry.file_id));

        let registry = build_registry(&outputs, &prior_exports);
        let link_report = link(&outputs, &registry);
        tracing::info!(
            target: "coordinator",
            "pass 2: {} resolved, {} external, {} dropped",
            link_report.resolved, link_report.external, link_report.dropped
        );
        self.finish_run(start, changed_files.len(), outputs, partial, link_report)
    }

    fn finish_run(
        &self,
        start: Instant,
        files_scanned: usize,
        outputs: Vec<ExtractionOutput>,
        mut partial: PartialStats,
        link_report: LinkReport,
    ) -> CoordinatorResult<IndexSummary> {
        self.emit_progress(Phase::Linking, outputs.len(), outputs.len(), "pass 2 complete");

        writer::write_link_report(self.store, link_report.clone()).map_err(|e| CoordinatorError::Store(store_error_of(e)))?;

        partial.errors.extend(link_report.errors.iter().map(|e| IndexingError {
            file_path: PathBuf::new(),
            phase: Phase::Linking,
            message: e.to_string(),
            recoverable: true,
        }));

        let summary = IndexSummary {
            success: true,
            files_indexed: partial.files_indexed,
            files_failed: partial.files_failed,
            entities_written: partial.entities + link_report.batch.entity_count(),
            relationships_written: partial.relationships + link_report.batch.relationship_count(),
            duration_ms: start.elapsed().as_millis() as u64,
            errors: partial.errors,
            phase_stats: vec![
                (Phase::Scanning, files_scanned),
                (Phase::Writing, partial.files_indexed),
                (Phase::Linking, link_report.resolved as usize),
            ],
        };
        tracing::info!(
            target: "coordinator",
            "index complete: {} files, {} entities, {} relationships in {:?}",
            summary.files_indexed, summary.entities_written, summary.relationships_written, start.elapsed()
        );
        self.emit_progress(Phase::Complete, summary.files_indexed, summary.files_indexed, "index complete");
        Ok(summary)
    }

    fn cancelled_summary(&self, start: Instant, mut partial: PartialStats) -> IndexSummary {
        partial.errors.push(IndexingError {
            file_path: PathBuf::new(),
            phase: Phase::Complete,
            message: "indexing run was cancelled".to_string(),
            recoverable: false,
        });
        IndexSummary {
            success: false,
            files_indexed: partial.files_indexed,
            files_failed: partial.files_failed,
            entities_written: partial.entities,
            relationships_written: partial.relationships,
            duration_ms: start.elapsed().as_millis() as u64,
            errors: partial.errors,
            phase_stats: vec![],
        }
    }

    fn emit_progress(&self, phase: Phase, processed: usize, total: usize, message: &str) {
        let percentage = if total == 0 { 100.0 } else { (processed as f32 / total as f32) * 100.0 };
        self.progress.on_progress(ProgressEvent {
            phase,
            processed,
            total,
            percentage,
            message: message.to_string(),
        });
    }

    /// Process `files` with bounded concurrency, in waves of `batch_size`.
    /// Never returns a fatal error: a per-file failure becomes an
    /// `IndexingError` collected in the returned stats, matching §4.I's "the
    /// coordinator aggregates per-call-site/per-file errors" contract.
    fn process_files(&self, files: &[FileDescriptor], resolver: &FileResolver) -> (Vec<ExtractionOutput>, PartialStats) {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency.max(1))
            .build()
            .expect("failed to build worker pool");

        let outputs = Mutex::new(Vec::with_capacity(files.len()));
        let stats = Mutex::new(PartialStats::default());
        let total = files.len();
        let processed = AtomicUsize::new(0);
        let stop_dispatch = AtomicBool::new(false);

        pool.install(|| {
            for chunk in files.chunks(self.config.batch_size.max(1)) {
                if self.is_cancelled() || stop_dispatch.load(Ordering::SeqCst) {
                    break;
                }
                chunk.par_iter().for_each(|file| {
                    if self.is_cancelled() {
                        return;
                    }
                    let result = self.process_one(file, resolver);
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    match result {
                        Ok(output) => {
                            let mut s = stats.lock();
                            s.files_indexed += 1;
                            s.entities += output.batch.entity_count();
                            s.relationships += output.batch.relationship_count();
                            drop(s);
                            outputs.lock().push(output);
                        }
                        Err(error) => {
                            tracing::warn!(
                                target: "coordinator",
                                "{}: {} ({})",
                                error.phase, error.message, error.file_path.display()
                            );
                            self.progress.on_error(error.clone());
                            let mut s = stats.lock();
                            s.files_failed += 1;
                            s.errors.push(error);
                            if !self.config.continue_on_error {
                                stop_dispatch.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                    self.emit_progress(Phase::Writing, done, total, "writing file");
                });
            }
        });

        (outputs.into_inner(), stats.into_inner())
    }

    fn process_one(&self, file: &FileDescriptor, resolver: &FileResolver) -> Result<ExtractionOutput, IndexingError> {
        let source = std::fs::read_to_string(&file.absolute_path).map_err(|e| IndexingError {
            file_path: file.absolute_path.clone(),
            phase: Phase::Scanning,
            message: format!("failed to read file: {e}"),
            recoverable: true,
        })?;

        let (parsed, tree, _source_text) = self.parser.parse_file_with_tree(&file.absolute_path, &source).map_err(|e| {
            tracing::debug!(target: "coordinator", "parse failed for {}: {e}", file.absolute_path.display());
            IndexingError {
                file_path: file.absolute_path.clone(),
                phase: Phase::Parsing,
                message: e.to_string(),
                recoverable: true,
            }
        })?;

        if tree.root_node().has_error() {
            tracing::debug!(target: "coordinator", "parse tree has error nodes for {}", file.absolute_path.display());
            return Err(IndexingError {
                file_path: file.absolute_path.clone(),
                phase: Phase::Parsing,
                message: "parsed tree contains error nodes".to_string(),
                recoverable: true,
            });
        }

        let mut output = extract_file(file, &parsed, resolver);

        if let Some(embedder) = self.embedder {
            let chunks = collect_embedding_chunks(&output.batch, &file.id);
            if !chunks.is_empty() {
                output.batch.embeddings.extend(embed_chunks(embedder, &file.id, chunks));
            }
        }

        writer::write_file(self.store, output.batch.clone()).map_err(|e| IndexingError {
            file_path: file.absolute_path.clone(),
            phase: Phase::Writing,
            message: e.to_string(),
            recoverable: true,
        })?;

        Ok(output)
    }
}

/// Build the whole-repo path index `FileResolver` needs from this run's scan,
/// without yet having written any `FileRow` to the store.
fn file_rows(files: &[FileDescriptor]) -> Vec<FileRow> {
    files
        .iter()
        .map(|f| FileRow {
            id: f.id.clone(),
            absolute_path: f.absolute_path.clone(),
            relative_path: f.relative_path.clone(),
            extension: f.extension.clone(),
            content_hash: f.content_hash.clone(),
            size_bytes: f.size_bytes,
            mtime_unix: f.mtime_unix,
            language: f.language,
            framework: None,
        })
        .collect()
}

fn store_error_of(e: WriteError) -> StoreError {
    match e {
        WriteError::Store { source, .. } => source,
    }
}

fn collect_embedding_chunks(batch: &Batch, file_id: &EntityId) -> Vec<EmbeddingChunk> {
    let mut chunks = Vec::new();
    for f in &batch.functions {
        let text = match &f.doc_comment {
            Some(doc) => format!("{doc}\n{}", f.signature),
            None => f.signature.clone(),
        };
        chunks.push(EmbeddingChunk {
            entity_id: f.id.clone(),
            file_id: file_id.clone(),
            text,
        });
    }
    for c in &batch.classes {
        let text = c.doc_comment.clone().unwrap_or_else(|| c.name.clone());
        chunks.push(EmbeddingChunk {
            entity_id: c.id.clone(),
            file_id: file_id.clone(),
            text,
        });
    }
    chunks
}

/// Embed a file's chunks. Failures are recoverable (§6 embedding contract):
/// the file's write proceeds without embeddings rather than failing.
fn embed_chunks(embedder: &dyn EmbeddingGenerator, file_id: &EntityId, chunks: Vec<EmbeddingChunk>) -> Vec<EmbeddingRow> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    match embedder.embed_batch(&texts) {
        Ok(vectors) => chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddingRow {
                entity_id: chunk.entity_id,
                file_id: file_id.clone(),
                vector: embedding.vector,
                text_hash: crate::scanner::hash_bytes(chunk.text.as_bytes()),
                model_id: embedder.model_id().to_string(),
                created_at_unix: chrono::Utc::now().timestamp(),
            })
            .collect(),
        Err(e) => {
            tracing::warn!(target: "coordinator", "embedding failed for {}, writing without embeddings: {e}", file_id.as_str());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding_contract::{Embedding, EmbeddingError};
    use crate::parser_contract::{ParseError, ParsedUnit, Tree};
    use std::fs;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct AlwaysFailsParser;
    impl SyntaxParser for AlwaysFailsParser {
        fn parse_file_with_tree(&self, path: &Path, _source: &str) -> Result<(ParsedUnit, Tree, String), ParseError> {
            Err(ParseError {
                language: "ts".to_string(),
                reason: format!("no grammar available for {}", path.display()),
            })
        }
    }

    struct StubEmbedder;
    impl EmbeddingGenerator for StubEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
            Ok(texts.iter().map(|_| Embedding { vector: vec![0.0; 384] }).collect())
        }
        fn model_id(&self) -> &str {
            "stub-embedder"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        errors: StdMutex<Vec<IndexingError>>,
    }
    impl ProgressSink for RecordingSink {
        fn on_progress(&self, _event: ProgressEvent) {}
        fn on_error(&self, error: IndexingError) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[test]
    fn files_that_fail_to_parse_are_recorded_as_recoverable_errors() {
        let project = tempdir().unwrap();
        fs::write(project.path().join("a.ts"), "export function a() {}").unwrap();
        fs::write(project.path().join("b.ts"), "export function b() {}").unwrap();

        let store_dir = tempdir().unwrap();
        let store = GraphStore::new(store_dir.path());
        store.initialize().unwrap();

        let parser = AlwaysFailsParser;
        let sink = RecordingSink::default();
        let coordinator = Coordinator::new(CoordinatorConfig::default(), &parser, None, &store, &sink);

        let summary = coordinator.run_full_index(project.path(), &ScanOptions::default()).unwrap();

        assert_eq!(summary.files_indexed, 0);
        assert_eq!(summary.files_failed, 2);
        assert_eq!(sink.errors.lock().unwrap().len(), 2);
        assert!(summary.errors.iter().all(|e| e.recoverable));
    }

    #[test]
    fn cancellation_before_dispatch_yields_unsuccessful_summary() {
        let project = tempdir().unwrap();
        fs::write(project.path().join("a.ts"), "export function a() {}").unwrap();

        let store_dir = tempdir().unwrap();
        let store = GraphStore::new(store_dir.path());
        store.initialize().unwrap();

        let parser = AlwaysFailsParser;
        let sink = RecordingSink::default();
        let coordinator = Coordinator::new(CoordinatorConfig::default(), &parser, None, &store, &sink);
        coordinator.cancellation_token().store(true, Ordering::SeqCst);

        let summary = coordinator.run_full_index(project.path(), &ScanOptions::default()).unwrap();
        assert!(!summary.success);
        assert!(summary.errors.iter().any(|e| e.message.contains("cancelled")));
    }

    #[test]
    fn collect_embedding_chunks_builds_one_chunk_per_function_and_class() {
        use crate::model::{mint, mint_file, ClassFlags, ClassRow, EntityKind, FunctionFlags, FunctionRow, Range};

        let file_id = mint_file("a.ts");
        let mut batch = Batch::for_file(file_id.clone());
        batch.functions.push(FunctionRow {
            id: mint(file_id.as_str(), EntityKind::Function, "greet", "sig"),
            owning_file: file_id.clone(),
            name: "greet".to_string(),
            range: crate::model::Range::new(0, 0, 1, 1),
            signature: "greet()".to_string(),
            return_type: None,
            flags: FunctionFlags::default(),
            cyclomatic_complexity: 1,
            parameter_count: 0,
            doc_comment: Some("Greets someone.".to_string()),
        });
        batch.classes.push(ClassRow {
            id: mint(file_id.as_str(), EntityKind::Class, "Greeter", "1"),
            owning_file: file_id.clone(),
            name: "Greeter".to_string(),
            range: Range::new(0, 0, 1, 1),
            flags: ClassFlags::default(),
            extends_target: None,
            implements_targets: vec![],
            doc_comment: None,
        });

        let chunks = collect_embedding_chunks(&batch, &file_id);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Greets someone."));
        assert_eq!(chunks[1].text, "Greeter");
    }

    #[test]
    fn embed_chunks_returns_empty_on_embedder_failure() {
        struct FailingEmbedder;
        impl EmbeddingGenerator for FailingEmbedder {
            fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
                Err(EmbeddingError {
                    reason: "model unavailable".to_string(),
                })
            }
            fn model_id(&self) -> &str {
                "failing"
            }
        }

        let file_id = crate::model::mint_file("a.ts");
        let chunks = vec![EmbeddingChunk {
            entity_id: file_id.clone(),
            file_id: file_id.clone(),
            text: "hello".to_string(),
        }];
        let rows = embed_chunks(&FailingEmbedder, &file_id, chunks);
        assert!(rows.is_empty());
    }

    #[test]
    fn embed_chunks_succeeds_with_stub_embedder() {
        let file_id = crate::model::mint_file("a.ts");
        let chunks = vec![EmbeddingChunk {
            entity_id: file_id.clone(),
            file_id: file_id.clone(),
            text: "hello".to_string(),
        }];
        let rows = embed_chunks(&StubEmbedder, &file_id, chunks);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model_id, "stub-embedder");
    }
}
