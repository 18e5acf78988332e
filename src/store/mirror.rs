//! In-memory traversal mirror, directly adapted from the teacher's
//! `storage/graph.rs` `DependencyGraph`: a `petgraph` directed graph keyed by
//! [`EntityId`], rebuilt from the relational tables on open and kept in
//! lockstep with every write. The query engine's edge-hop matching walks
//! this structure rather than scanning edge row vectors directly.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::{EntityId, RelationKind};
use crate::store::tables::Tables;

/// Edge weight carried by the mirror: just the relation kind. Row attributes
/// (line numbers, visibility, etc.) live in the relational tables; the
/// mirror only needs enough to filter traversals by relation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeWeight {
    pub kind: RelationKind,
}

/// The in-memory graph mirror. Not persisted — rebuilt from [`Tables`] every
/// time the store opens, the same way the teacher's `DependencyGraph` is
/// populated fresh from indexing rather than snapshotted itself.
#[derive(Debug, Default)]
pub struct GraphMirror {
    graph: StableDiGraph<EntityId, EdgeWeight>,
    node_index: HashMap<EntityId, NodeIndex>,
}

impl GraphMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the mirror from scratch off the current relational tables.
    pub fn rebuild(tables: &Tables) -> Self {
        let mut mirror = Self::new();

        for id in all_entity_ids(tables) {
            mirror.ensure_node(&id);
        }

        for edge in &tables.contains {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::Contains);
        }
        for edge in &tables.calls {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::Calls);
        }
        for edge in &tables.imports {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::Imports);
        }
        for edge in &tables.extends {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::Extends);
        }
        for edge in &tables.implements {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::Implements);
        }
        for edge in &tables.extends_interface {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::ExtendsInterface);
        }
        for edge in &tables.has_method {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::HasMethod);
        }
        for edge in &tables.uses_type {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::UsesType);
        }
        for edge in &tables.references_external {
            mirror.add_edge(&edge.from, &edge.to, RelationKind::ReferencesExternal);
        }

        mirror
    }

    fn ensure_node(&mut self, id: &EntityId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_index.insert(id.clone(), idx);
        idx
    }

    fn add_edge(&mut self, from: &EntityId, to: &EntityId, kind: RelationKind) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        self.graph.add_edge(from_idx, to_idx, EdgeWeight { kind });
    }

    /// Entity IDs reachable from `start` via outgoing edges of `kind`.
    pub fn successors(&self, start: &EntityId, kind: RelationKind) -> Vec<EntityId> {
        let Some(&idx) = self.node_index.get(start) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().kind == kind)
            .filter_map(|e| self.graph.node_weight(e.target()).cloned())
            .collect()
    }

    /// Entity IDs with an outgoing edge of `kind` into `target`.
    pub fn predecessors(&self, target: &EntityId, kind: RelationKind) -> Vec<EntityId> {
        let Some(&idx) = self.node_index.get(target) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().kind == kind)
            .filter_map(|e| self.graph.node_weight(e.source()).cloned())
            .collect()
    }

    pub fn contains_node(&self, id: &EntityId) -> bool {
        self.node_index.contains_key(id)
    }
}

fn all_entity_ids(tables: &Tables) -> Vec<EntityId> {
    let mut ids = Vec::with_capacity(tables.entity_count());
    ids.extend(tables.files.iter().map(|r| r.id.clone()));
    ids.extend(tables.functions.iter().map(|r| r.id.clone()));
    ids.extend(tables.classes.iter().map(|r| r.id.clone()));
    ids.extend(tables.interfaces.iter().map(|r| r.id.clone()));
    ids.extend(tables.type_aliases.iter().map(|r| r.id.clone()));
    ids.extend(tables.variables.iter().map(|r| r.id.clone()));
    ids.extend(tables.ghosts.iter().map(|r| r.id.clone()));
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{mint_file, CallsEdge, FileRow, Language};
    use std::path::PathBuf;

    fn file_row(relative_path: &str) -> FileRow {
        FileRow {
            id: mint_file(relative_path),
            absolute_path: PathBuf::from(relative_path),
            relative_path: relative_path.to_string(),
            extension: "ts".to_string(),
            content_hash: "h".to_string(),
            size_bytes: 0,
            mtime_unix: 0,
            language: Language::TypeScript,
            framework: None,
        }
    }

    #[test]
    fn rebuild_reflects_calls_edges() {
        let mut tables = Tables::default();
        let a = mint_file("a.ts");
        let b = mint_file("b.ts");
        tables.files.push(file_row("a.ts"));
        tables.files.push(file_row("b.ts"));
        tables.calls.push(CallsEdge {
            from: b.clone(),
            to: a.clone(),
            line: 1,
            direct: true,
            awaited: false,
        });

        let mirror = GraphMirror::rebuild(&tables);
        assert_eq!(mirror.successors(&b, RelationKind::Calls), vec![a.clone()]);
        assert_eq!(mirror.predecessors(&a, RelationKind::Calls), vec![b]);
    }
}
