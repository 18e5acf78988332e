//! Project discovery and file scanning (component B).
//!
//! Walks a project root with `.gitignore`-aware traversal, applies
//! include/exclude globs on top of that, and emits one [`FileDescriptor`]
//! per scanned file with a stable content hash. Both a batch API ([`scan`])
//! and a streaming API ([`scan_stream`]) are exposed; the stream never
//! materializes the full file list, so a coordinator with a bounded worker
//! pool can start dispatching parse/extract work before the walk finishes.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use glob::Pattern;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};

use crate::error::ScanError;
use crate::model::{mint_file, EntityId, Language};

/// A single discovered source file, already hashed and language-tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub id: EntityId,
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub extension: String,
    pub size_bytes: u64,
    pub mtime_unix: i64,
    pub content_hash: String,
    pub language: Language,
}

/// Scan configuration. Patterns are matched against the repo-relative path.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// When false, `content_hash` is left empty and no file content is read
    /// (useful for a quick "what would be indexed" dry run).
    pub hash_contents: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: vec![
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            hash_contents: true,
        }
    }
}

/// A file the walker found but could not be read. Non-fatal: the entry is
/// skipped and reported, the scan continues.
#[derive(Debug, Clone)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a batch scan: the deterministically ordered file set plus any
/// non-fatal per-file warnings.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files: Vec<FileDescriptor>,
    pub warnings: Vec<ScanWarning>,
}

struct CompiledGlobs {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl CompiledGlobs {
    fn compile(options: &ScanOptions) -> Result<Self, ScanError> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Pattern>, ScanError> {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p).map_err(|source| ScanError::InvalidGlob {
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect()
        };
        Ok(Self {
            include: compile_all(&options.include)?,
            exclude: compile_all(&options.exclude)?,
        })
    }

    fn matches(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(relative_path));
        let excluded = self.exclude.iter().any(|p| p.matches(relative_path));
        included && !excluded
    }
}

/// Walk `root`, returning the full deterministically-ordered file set.
///
/// Results are sorted by repo-relative path, so two scans of identical
/// content produce byte-identical descriptor order (testable property 1).
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanReport, ScanError> {
    let mut report = ScanReport::default();
    for item in scan_stream(root, options)? {
        match item {
            Ok(descriptor) => report.files.push(descriptor),
            Err(warning) => {
                tracing::warn!(target: "scanner", "skipping {}: {}", warning.path.display(), warning.message);
                report.warnings.push(warning);
            }
        }
    }
    report.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::debug!(target: "scanner", "scanned {} files ({} warnings) under {}", report.files.len(), report.warnings.len(), root.display());
    Ok(report)
}

/// Walk `root`, yielding descriptors as they are discovered. Order matches
/// the underlying walker's traversal order, not repo-relative path order —
/// callers that need the deterministic ordering should use [`scan`].
pub fn scan_stream(
    root: &Path,
    options: &ScanOptions,
) -> Result<impl Iterator<Item = Result<FileDescriptor, ScanWarning>>, ScanError> {
    let globs = CompiledGlobs::compile(options)?;
    let root = root.to_path_buf();
    let hash_contents = options.hash_contents;

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .follow_links(false)
        .require_git(false);

    let walker = builder.build();

    Ok(walker.filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => return None,
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            return None;
        }

        let absolute_path = entry.path().to_path_buf();
        let relative_path = absolute_path
            .strip_prefix(&root)
            .unwrap_or(&absolute_path)
            .to_string_lossy()
            .replace('\\', "/");

        if !globs.matches(&relative_path) {
            return None;
        }

        Some(describe(&absolute_path, &relative_path, hash_contents))
    }))
}

fn describe(
    absolute_path: &Path,
    relative_path: &str,
    hash_contents: bool,
) -> Result<FileDescriptor, ScanWarning> {
    let metadata = std::fs::metadata(absolute_path).map_err(|e| ScanWarning {
        path: absolute_path.to_path_buf(),
        message: format!("could not stat file: {e}"),
    })?;

    let mtime_unix = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let content_hash = if hash_contents {
        let bytes = std::fs::read(absolute_path).map_err(|e| ScanWarning {
            path: absolute_path.to_path_buf(),
            message: format!("could not read file: {e}"),
        })?;
        hash_bytes(&bytes)
    } else {
        String::new()
    };

    let extension = absolute_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileDescriptor {
        id: mint_file(relative_path),
        absolute_path: absolute_path.to_path_buf(),
        relative_path: relative_path.to_string(),
        extension: extension.clone(),
        size_bytes: metadata.len(),
        mtime_unix,
        content_hash,
        language: Language::from_extension(&extension),
    })
}

/// SHA-256 hex digest of `bytes` — the content hash the incremental updater
/// diffs against (§3 invariant 6, §8 property 2).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
