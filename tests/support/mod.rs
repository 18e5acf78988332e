//! Shared fixtures for the end-to-end scenarios: a hand-built `ParsedUnit`
//! stand-in for the external syntax parser (see `parser_contract`), so these
//! tests exercise scan -> extract -> link -> write -> query without needing
//! a concrete tree-sitter grammar.
//!
//! [`ScenarioParser`] additionally wires a real `tree_sitter_typescript` tree
//! (dev-dependency only, see `Cargo.toml`) so coordinator-level tests can
//! exercise the parse-tree-validity gate (`process_one`'s `has_error` check)
//! with a genuine syntax tree, while still controlling each file's
//! `ParsedUnit` exactly via a hand-authored fixture keyed by relative path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use codegraph_index::model::{mint_file, FileRow, Language, Range, ScopeTag, Visibility};
use codegraph_index::parser_contract::{ParseError, ParsedUnit, RawFunction, RawImport, RawImportKind, SyntaxParser, Tree};
use codegraph_index::scanner::FileDescriptor;

pub fn descriptor(relative_path: &str, content_hash: &str) -> FileDescriptor {
    FileDescriptor {
        id: mint_file(relative_path),
        absolute_path: PathBuf::from(relative_path),
        relative_path: relative_path.to_string(),
        extension: "ts".to_string(),
        size_bytes: 0,
        mtime_unix: 0,
        content_hash: content_hash.to_string(),
        language: Language::TypeScript,
    }
}

pub fn file_row_from(descriptor: &FileDescriptor) -> FileRow {
    FileRow {
        id: descriptor.id.clone(),
        absolute_path: descriptor.absolute_path.clone(),
        relative_path: descriptor.relative_path.clone(),
        extension: descriptor.extension.clone(),
        content_hash: descriptor.content_hash.clone(),
        size_bytes: descriptor.size_bytes,
        mtime_unix: descriptor.mtime_unix,
        language: descriptor.language,
        framework: None,
    }
}

pub fn exported_function(name: &str, body: &str) -> RawFunction {
    RawFunction {
        name: name.to_string(),
        range: Range::new(0, 0, 2, 1),
        signature: format!("{name}(): void"),
        return_type: None,
        exported: true,
        is_async: false,
        is_generator: false,
        parameter_count: 0,
        doc_comment: None,
        raw_body: body.to_string(),
        owning_class: None,
        visibility: Visibility::Public,
        is_static: false,
        is_abstract: false,
    }
}

pub fn parsed_with_function(function: RawFunction) -> ParsedUnit {
    let mut parsed = ParsedUnit::default();
    parsed.functions.push(function);
    parsed
}

pub fn default_import(specifier: &str, imported_name: &str) -> RawImport {
    RawImport {
        specifier: specifier.to_string(),
        imported_name: imported_name.to_string(),
        local_alias: None,
        kind: RawImportKind::Default,
        type_only: false,
    }
}

#[allow(dead_code)]
pub fn module_scope() -> ScopeTag {
    ScopeTag::Module
}

/// A test-only [`SyntaxParser`]: returns a fixed `ParsedUnit` per relative
/// path (registered ahead of time), paired with a real tree parsed from the
/// file's actual on-disk TypeScript source so the coordinator's
/// `tree.root_node().has_error()` gate runs against genuine syntax, not a
/// stub. Unregistered paths fall through to a syntax error so a test that
/// forgets to register a fixture fails loudly instead of silently skipping
/// extraction.
#[allow(dead_code)]
pub struct ScenarioParser {
    by_relative_path: HashMap<String, ParsedUnit>,
    root: PathBuf,
}

#[allow(dead_code)]
impl ScenarioParser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            by_relative_path: HashMap::new(),
            root: root.into(),
        }
    }

    pub fn register(&mut self, relative_path: &str, parsed: ParsedUnit) {
        self.by_relative_path.insert(relative_path.to_string(), parsed);
    }
}

impl SyntaxParser for ScenarioParser {
    fn parse_file_with_tree(&self, path: &Path, source: &str) -> Result<(ParsedUnit, Tree, String), ParseError> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().replace('\\', "/");
        let parsed = self.by_relative_path.get(relative.as_str()).cloned().ok_or_else(|| ParseError {
            language: "typescript".to_string(),
            reason: format!("no fixture registered for {relative}"),
        })?;

        let mut ts_parser = tree_sitter::Parser::new();
        ts_parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .expect("typescript grammar loads");
        let tree = ts_parser.parse(source, None).ok_or_else(|| ParseError {
            language: "typescript".to_string(),
            reason: "tree-sitter produced no tree".to_string(),
        })?;

        Ok((parsed, tree, source.to_string()))
    }
}
