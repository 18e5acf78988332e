//! Node (entity) row types. One struct per entity kind, plus the
//! `EntityKind` discriminator used by the identifier mint and the store's
//! schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::EntityId;

/// Discriminator for the tagged-variant entity model — deliberately flat,
/// no subtype-inheritance tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Function,
    Class,
    Interface,
    TypeAlias,
    Variable,
    Ghost,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::TypeAlias => "type_alias",
            EntityKind::Variable => "variable",
            EntityKind::Ghost => "ghost",
        }
    }
}

/// A byte/line range within a source file, half-open on lines (end_line is
/// the last line that belongs to the declaration, inclusive — matching how
/// most syntax trees report node spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_byte: u32,
    pub end_line: u32,
    pub end_byte: u32,
}

impl Range {
    pub fn new(start_line: u32, start_byte: u32, end_line: u32, end_byte: u32) -> Self {
        Self {
            start_line,
            start_byte,
            end_line,
            end_byte,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Other,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "rs" => Language::Rust,
            "py" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            _ => Language::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub id: EntityId,
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub extension: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub mtime_unix: i64,
    pub language: Language,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FunctionFlags {
    pub exported: bool,
    pub is_async: bool,
    pub is_generator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRow {
    pub id: EntityId,
    pub owning_file: EntityId,
    pub name: String,
    pub range: Range,
    pub signature: String,
    pub return_type: Option<String>,
    pub flags: FunctionFlags,
    pub cyclomatic_complexity: u32,
    pub parameter_count: u32,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassFlags {
    pub is_abstract: bool,
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRow {
    pub id: EntityId,
    pub owning_file: EntityId,
    pub name: String,
    pub range: Range,
    pub flags: ClassFlags,
    pub extends_target: Option<String>,
    pub implements_targets: Vec<String>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InterfaceFlags {
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRow {
    pub id: EntityId,
    pub owning_file: EntityId,
    pub name: String,
    pub range: Range,
    pub flags: InterfaceFlags,
    pub extends_targets: Vec<String>,
    pub doc_comment: Option<String>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAliasRow {
    pub id: EntityId,
    pub owning_file: EntityId,
    pub name: String,
    pub range: Range,
    pub exported: bool,
    pub type_expr: String,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub byte: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeTag {
    Module,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VariableFlags {
    pub is_const: bool,
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRow {
    pub id: EntityId,
    pub owning_file: EntityId,
    pub name: String,
    pub position: Position,
    pub declared_type: Option<String>,
    pub flags: VariableFlags,
    pub scope: ScopeTag,
}

/// The kind of symbol a ghost stands in for, e.g. to render a reasonable
/// default signature when the real one is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GhostKind {
    Function,
    Class,
    Module,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostRow {
    pub id: EntityId,
    pub name: String,
    pub package_name: Option<String>,
    pub kind: GhostKind,
    pub signature: Option<String>,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub entity_id: EntityId,
    pub file_id: EntityId,
    pub vector: Vec<f32>,
    pub text_hash: String,
    pub model_id: String,
    pub created_at_unix: i64,
}
