//! Brute-force nearest-neighbor search over entity embeddings (§4.H / §6).
//!
//! The teacher's own vector layer is an ANN index (`fastembed`/`ort` plus an
//! HNSW-backed store); this spec's dependency ledger drops that stack (see
//! DESIGN.md) in favor of a linear scan, since the scale this indexer targets
//! (a single project's embeddings) never approaches the size where an ANN
//! index earns its complexity. Distance is cosine, ascending (0 = identical
//! direction).

use thiserror::Error;

use crate::model::EntityId;
use crate::store::tables::Tables;

/// Fixed embedding dimension the store accepts. Every `EmbeddingRow` and
/// every search query vector must match this exactly.
pub const EMBEDDING_DIM: usize = 384;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VectorError {
    #[error("query vector has dimension {found}, expected {expected}")]
    DimensionMismatch { found: usize, expected: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub entity_id: EntityId,
    pub file_id: EntityId,
    pub distance: f32,
    /// The entity's declared name, when it can be resolved from the
    /// relational tables (§4.H: `vector_search(...) -> [(..., name?)]`).
    pub name: Option<String>,
}

/// Find the `k` nearest embeddings to `query` by cosine distance, ascending.
/// An empty index returns an empty list rather than an error (testable
/// property 6 / scenario S6) — only a dimension mismatch on a non-empty
/// query is an error condition.
pub fn search(tables: &Tables, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorError> {
    if tables.embeddings.is_empty() {
        return Ok(Vec::new());
    }
    if query.len() != EMBEDDING_DIM {
        return Err(VectorError::DimensionMismatch {
            found: query.len(),
            expected: EMBEDDING_DIM,
        });
    }

    let mut hits: Vec<VectorHit> = tables
        .embeddings
        .iter()
        .map(|row| VectorHit {
            entity_id: row.entity_id.clone(),
            file_id: row.file_id.clone(),
            distance: cosine_distance(query, &row.vector),
            name: entity_name(tables, &row.entity_id),
        })
        .collect();

    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    Ok(hits)
}

/// Resolve an entity's declared `name` field across every node relation that
/// carries one, for the `name?` projection in `vector_search`'s result tuple.
/// Files have no `name` field (they carry `relative_path` instead), so a
/// file-keyed embedding resolves to `None`.
fn entity_name(tables: &Tables, id: &EntityId) -> Option<String> {
    if let Some(row) = tables.functions.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    if let Some(row) = tables.classes.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    if let Some(row) = tables.interfaces.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    if let Some(row) = tables.type_aliases.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    if let Some(row) = tables.variables.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    if let Some(row) = tables.ghosts.iter().find(|r| &r.id == id) {
        return Some(row.name.clone());
    }
    None
}

/// `1 - cosine_similarity`, clamped to `[0, 2]`. Vectors of mismatched
/// length (a malformed stored row) are treated as maximally distant rather
/// than panicking — the store never trusts on-disk data blindly.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - (dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{mint_file, EmbeddingRow};

    fn embedding(entity: &str, vector: Vec<f32>) -> EmbeddingRow {
        let id = mint_file(entity);
        EmbeddingRow {
            entity_id: id.clone(),
            file_id: id,
            vector,
            text_hash: "h".to_string(),
            model_id: "m".to_string(),
            created_at_unix: 0,
        }
    }

    #[test]
    fn empty_index_returns_empty_list_not_error() {
        let tables = Tables::default();
        let query = vec![0.0; EMBEDDING_DIM];
        let hits = search(&tables, &query, 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn nearest_neighbor_ranks_identical_vector_first() {
        let mut tables = Tables::default();
        let mut close = vec![0.0; EMBEDDING_DIM];
        close[0] = 1.0;
        let mut far = vec![0.0; EMBEDDING_DIM];
        far[1] = 1.0;
        tables.embeddings.push(embedding("close.ts", close.clone()));
        tables.embeddings.push(embedding("far.ts", far));

        let hits = search(&tables, &close, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity_id, mint_file("close.ts"));
        assert!(hits[0].distance < 0.001);
    }

    #[test]
    fn result_count_is_min_of_k_and_index_size() {
        let mut tables = Tables::default();
        for i in 0..3 {
            let mut vector = vec![0.0; EMBEDDING_DIM];
            vector[i] = 1.0;
            tables.embeddings.push(embedding(&format!("f{i}.ts"), vector));
        }
        let query = vec![0.0; EMBEDDING_DIM];

        assert_eq!(search(&tables, &query, 10).unwrap().len(), 3, "k > K truncates to K");
        assert_eq!(search(&tables, &query, 2).unwrap().len(), 2, "k < K truncates to k");
        assert_eq!(search(&tables, &query, 0).unwrap().len(), 0);
    }

    #[test]
    fn dimension_mismatch_on_nonempty_index_is_an_error() {
        let mut tables = Tables::default();
        tables.embeddings.push(embedding("a.ts", vec![0.0; EMBEDDING_DIM]));
        let err = search(&tables, &[0.0; 3], 5).unwrap_err();
        assert_eq!(
            err,
            VectorError::DimensionMismatch {
                found: 3,
                expected: EMBEDDING_DIM
            }
        );
    }
}
