//! The parser contract: the language-specific syntax-tree producer is an
//! external collaborator. This module pins only the shapes the extraction
//! pipeline needs from it — it never implements a concrete multi-language
//! parser itself.

use std::path::Path;

use crate::model::Range;

/// A byte-range-addressable re-walkable syntax tree. Concrete parsers hand
/// back a real `tree_sitter::Tree`; the extraction pipeline does not match
/// on language-specific node kinds (see `src/extraction` for why), so it
/// only ever consults `root_node()` to validate that the tree is not empty.
pub type Tree = tree_sitter::Tree;

/// One top-level declaration as reported by the parser, before extraction
/// turns it into a typed entity row. `raw_body` is the exact source slice
/// for the declaration (used by the extraction pipeline's call-site and
/// type-reference scan); `doc_comment` is whatever comment the parser
/// attached immediately above the declaration.
#[derive(Debug, Clone)]
pub struct RawFunction {
    pub name: String,
    pub range: Range,
    pub signature: String,
    pub return_type: Option<String>,
    pub exported: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub parameter_count: u32,
    pub doc_comment: Option<String>,
    pub raw_body: String,
    /// Name of the owning class, if this function is a method.
    pub owning_class: Option<String>,
    pub visibility: crate::model::Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone)]
pub struct RawClass {
    pub name: String,
    pub range: Range,
    pub is_abstract: bool,
    pub exported: bool,
    pub extends_target: Option<String>,
    pub implements_targets: Vec<String>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawInterface {
    pub name: String,
    pub range: Range,
    pub exported: bool,
    pub extends_targets: Vec<String>,
    pub doc_comment: Option<String>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RawTypeAlias {
    pub name: String,
    pub range: Range,
    pub exported: bool,
    pub type_expr: String,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawVariable {
    pub name: String,
    pub position_line: u32,
    pub position_byte: u32,
    pub declared_type: Option<String>,
    pub is_const: bool,
    pub exported: bool,
    pub scope: crate::model::ScopeTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawImportKind {
    Named,
    Default,
    Namespace,
}

/// One imported symbol from one specifier. `specifier` is the raw module
/// path/package name exactly as written (e.g. `"./foo"` or `"axios"`); the
/// extraction pipeline resolves it to a File ID or a ghost package name.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub specifier: String,
    pub imported_name: String,
    /// The local alias this import is bound to in the importing file, if
    /// different from `imported_name` (`import { foo as bar }`).
    pub local_alias: Option<String>,
    pub kind: RawImportKind,
    pub type_only: bool,
}

/// The full set of top-level declarations the parser found in one file.
#[derive(Debug, Clone, Default)]
pub struct ParsedUnit {
    pub functions: Vec<RawFunction>,
    pub classes: Vec<RawClass>,
    pub interfaces: Vec<RawInterface>,
    pub type_aliases: Vec<RawTypeAlias>,
    pub variables: Vec<RawVariable>,
    pub imports: Vec<RawImport>,
}

/// Error surfaced by a concrete parser implementation. Recoverable: the
/// coordinator skips the file and records a warning.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to parse {language} file: {reason}")]
pub struct ParseError {
    pub language: String,
    pub reason: String,
}

/// The external parser contract. A concrete implementation wraps a real
/// tree-sitter grammar; this crate ships no such implementation (see
/// DESIGN.md) and tests drive extraction directly off hand-built
/// `ParsedUnit` fixtures instead.
pub trait SyntaxParser: Send + Sync {
    fn parse_file_with_tree(
        &self,
        path: &Path,
        source: &str,
    ) -> Result<(ParsedUnit, Tree, String), ParseError>;

    /// Parse a single function body into a re-walkable tree, for downstream
    /// semantic analysis. Optional: when a parser doesn't implement this,
    /// callers must skip the semantic-analysis step without treating it as
    /// an error.
    fn parse_function_body(&self, _body: &str, _language: crate::model::Language) -> Option<Tree> {
        None
    }
}
