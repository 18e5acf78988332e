//! Edge (relationship) row types. Directed, keyed by `(from, to)` unless
//! noted; never modeled as a recursive owned structure — the store's
//! in-memory mirror and persisted tables both treat these as flat edge sets.

use serde::{Deserialize, Serialize};

use super::EntityId;

/// The relation kind discriminator, used by the query language's
/// `[:REL]` edge-pattern matching and by the in-memory graph mirror's edge
/// weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Contains,
    Calls,
    Imports,
    Extends,
    Implements,
    ExtendsInterface,
    HasMethod,
    UsesType,
    ReferencesExternal,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contains => "contains",
            RelationKind::Calls => "calls",
            RelationKind::Imports => "imports",
            RelationKind::Extends => "extends",
            RelationKind::Implements => "implements",
            RelationKind::ExtendsInterface => "extends_interface",
            RelationKind::HasMethod => "has_method",
            RelationKind::UsesType => "uses_type",
            RelationKind::ReferencesExternal => "references_external",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "contains" => RelationKind::Contains,
            "calls" => RelationKind::Calls,
            "imports" => RelationKind::Imports,
            "extends" => RelationKind::Extends,
            "implements" => RelationKind::Implements,
            "extends_interface" => RelationKind::ExtendsInterface,
            "has_method" => RelationKind::HasMethod,
            "uses_type" => RelationKind::UsesType,
            "references_external" => RelationKind::ReferencesExternal,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub line: u32,
    pub direct: bool,
    pub awaited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportsEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub symbols: Vec<String>,
    pub kind: ImportKind,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendsEdge {
    pub from: EntityId,
    pub to: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementsEdge {
    pub from: EntityId,
    pub to: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendsInterfaceEdge {
    pub from: EntityId,
    pub to: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasMethodEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsesTypeEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub context: String,
    pub parameter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesExternalEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub context: String,
    pub line: u32,
}
