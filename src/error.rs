//! Error types for the code-knowledge indexer.
//!
//! This module provides structured error types using thiserror, one enum per
//! subsystem, so callers can match on the failure mode that matters to them
//! without parsing strings.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::EntityId;

/// Errors raised while walking the project tree.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: ignore::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised by the extraction pipeline.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The parsed tree's root is structurally unusable; nothing could be
    /// extracted from this file at all.
    #[error("parsed tree for '{path}' has no usable root: {reason}")]
    BadTree { path: PathBuf, reason: String },
}

/// A non-fatal extraction warning: a construct the extractor did not
/// understand. Extraction proceeds past these; they are collected for
/// reporting, never raised as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    pub file: PathBuf,
    pub message: String,
}

/// Errors raised by the Pass-2 call-graph linker for an individual call site.
/// Per-call-site recoverable; the coordinator aggregates counts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("callee '{callee_expr}' referenced from {caller:?} could not be resolved to a symbol or a package")]
    Unresolved {
        caller: EntityId,
        callee_expr: String,
    },
}

/// Errors raised by the graph store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store is not ready (state: {state})")]
    NotReady { state: String },

    #[error("store schema version {found} is newer than the code's supported version {supported}")]
    SchemaMismatch { found: u32, supported: u32 },

    #[error("failed to persist relation '{relation}' to '{path}': {source}")]
    Persistence {
        relation: String,
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to load relation '{relation}' from '{path}': {source}")]
    Load {
        relation: String,
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("query script error: {0}")]
    Query(#[from] crate::store::query::QueryError),

    #[error("vector search error: {0}")]
    Vector(#[from] crate::store::vector::VectorError),

    #[error("transaction failed, rolled back: {cause}")]
    TransactionFailed { cause: String },
}

/// Errors raised by the graph writer while applying a batch.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("write for file {file_id:?} failed: {source}")]
    Store {
        file_id: EntityId,
        #[source]
        source: StoreError,
    },
}

/// A single per-file error surfaced by the coordinator. Carries enough
/// context for a caller to decide whether to keep going.
#[derive(Debug, Clone)]
pub struct IndexingError {
    pub file_path: PathBuf,
    pub phase: Phase,
    pub message: String,
    pub recoverable: bool,
}

/// Coordinator pipeline phases, used both for progress events and for error
/// tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Scanning,
    Parsing,
    Extracting,
    Writing,
    Linking,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Scanning => "scanning",
            Phase::Parsing => "parsing",
            Phase::Extracting => "extracting",
            Phase::Writing => "writing",
            Phase::Linking => "linking",
            Phase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Top-level error for the coordinator. Fatal conditions only: scan failures,
/// store state errors, and explicit cancellation. Per-file errors are
/// collected into `IndexResult::errors` instead of being raised here.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("indexing run was cancelled")]
    Cancelled,
}

pub type ScanResult<T> = Result<T, ScanError>;
pub type ExtractionResult<T> = Result<T, ExtractionError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type WriteResult<T> = Result<T, WriteError>;
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
