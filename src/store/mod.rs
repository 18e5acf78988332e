//! The graph store: the black-box boundary for the whole system (§4.H).
//!
//! Two cooperating layers — a durable relational [`tables::Tables`] snapshot
//! and an in-memory [`mirror::GraphMirror`] traversal index — guarded by a
//! `parking_lot::RwLock` pair, generalized from the teacher's split between
//! its Tantivy document index and `petgraph`-backed `DependencyGraph`.

pub mod mirror;
pub mod query;
pub mod tables;
pub mod vector;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::{Batch, EntityId};
use mirror::GraphMirror;
use query::{Params, Row};
use tables::Tables;
use vector::VectorHit;

/// The code's current schema version. Bumped whenever a node/edge relation's
/// shape changes; a store whose on-disk version is greater than this is
/// refused rather than silently misread (§4.H schema migration note).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_FILE: &str = "schema_version";

/// State machine of a store handle (§4.H): any operation outside `Ready`
/// fails with `StoreError::NotReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Closed,
    Initializing,
    Ready,
    Closing,
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreState::Closed => "closed",
            StoreState::Initializing => "initializing",
            StoreState::Ready => "ready",
            StoreState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// The graph store handle. `base` is the persisted directory: `tables/` per
/// relation, `vectors/` (embeddings live inside `tables::Tables` itself, so
/// this directory currently holds no separate files — reserved so the
/// layout matches §6's "Persisted state layout" without a breaking change
/// if a dedicated vector index format is added later), and
/// `schema_version`.
pub struct GraphStore {
    base: PathBuf,
    state: RwLock<StoreState>,
    tables: RwLock<Tables>,
    mirror: RwLock<GraphMirror>,
}

impl GraphStore {
    /// Create a handle bound to `base`. The handle starts `Closed`; call
    /// [`GraphStore::initialize`] before issuing any other operation.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            state: RwLock::new(StoreState::Closed),
            tables: RwLock::new(Tables::default()),
            mirror: RwLock::new(GraphMirror::new()),
        }
    }

    /// Create the schema if absent, or verify/upgrade it if present. Loads
    /// the persisted tables (if any) and rebuilds the in-memory mirror.
    pub fn initialize(&self) -> Result<(), StoreError> {
        *self.state.write() = StoreState::Initializing;

        fs::create_dir_all(&self.base).map_err(|e| StoreError::Persistence {
            relation: "store".to_string(),
            path: self.base.clone(),
            source: Box::new(e),
        })?;
        fs::create_dir_all(self.base.join("vectors")).map_err(|e| StoreError::Persistence {
            relation: "vectors".to_string(),
            path: self.base.join("vectors"),
            source: Box::new(e),
        })?;

        let version_path = self.base.join(SCHEMA_VERSION_FILE);
        if version_path.exists() {
            let found = read_schema_version(&version_path)?;
            if found > CURRENT_SCHEMA_VERSION {
                tracing::error!(target: "store", "refusing to open schema version {found}, supported up to {CURRENT_SCHEMA_VERSION}");
                *self.state.write() = StoreState::Closed;
                return Err(StoreError::SchemaMismatch {
                    found,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
            // Forward-only migrations would run here, keyed by `found`. No
            // migration is registered yet since this is schema version 1.
        } else {
            write_schema_version(&version_path, CURRENT_SCHEMA_VERSION)?;
        }

        let loaded = Tables::load(&self.base)?;
        let mirror = GraphMirror::rebuild(&loaded);
        let entity_count = loaded.entity_count();
        *self.tables.write() = loaded;
        *self.mirror.write() = mirror;

        *self.state.write() = StoreState::Ready;
        tracing::info!(target: "store", "store ready at {} ({entity_count} entities)", self.base.display());
        Ok(())
    }

    /// Leave `Ready`, flushing nothing further (every write already
    /// persisted synchronously). Idempotent past the first call.
    pub fn close(&self) {
        *self.state.write() = StoreState::Closing;
        *self.state.write() = StoreState::Closed;
    }

    pub fn has_schema(&self) -> bool {
        self.base.join(SCHEMA_VERSION_FILE).exists()
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        read_schema_version(&self.base.join(SCHEMA_VERSION_FILE))
    }

    fn require_ready(&self) -> Result<(), StoreError> {
        let state = *self.state.read();
        if state == StoreState::Ready {
            Ok(())
        } else {
            Err(StoreError::NotReady {
                state: state.to_string(),
            })
        }
    }

    /// Apply one batch atomically with respect to external readers: the
    /// tables write lock is held for the full delete-then-insert, and the
    /// mirror is rebuilt before the lock is released, so no reader observes
    /// a partial state. Persists to disk before returning.
    pub fn write_batch(&self, batch: Batch) -> Result<(), StoreError> {
        self.require_ready()?;
        let mut tables = self.tables.write();
        if batch.file_id.is_some() {
            tables.apply_file_batch(batch);
        } else {
            tables.apply_global_batch(batch);
        }
        let mirror = GraphMirror::rebuild(&tables);
        *self.mirror.write() = mirror;
        tables.persist(&self.base)
    }

    /// Delete everything a file owns (entities, embeddings, edges touching
    /// them; ghosts are preserved). Persists immediately.
    pub fn delete_file(&self, file_id: &EntityId) -> Result<(), StoreError> {
        self.require_ready()?;
        let mut tables = self.tables.write();
        tables.delete_file(file_id);
        let mirror = GraphMirror::rebuild(&tables);
        *self.mirror.write() = mirror;
        tables.persist(&self.base)
    }

    /// Every currently stored File row. Used by the incremental updater to
    /// build the `stored` side of its diff.
    pub fn file_rows(&self) -> Result<Vec<crate::model::FileRow>, StoreError> {
        self.require_ready()?;
        Ok(self.tables.read().files.clone())
    }

    /// Every currently exported symbol across every file, as linker registry
    /// entries. Used by the incremental coordinator to extend this run's
    /// fresh exports with exports from files that were not re-extracted
    /// (§4.I: "Pass 2 must still see exports from *all* currently-indexed
    /// files").
    pub fn exported_symbols(&self) -> Result<Vec<crate::linking::RegistryEntry>, StoreError> {
        self.require_ready()?;
        let tables = self.tables.read();
        let relative_path_of = |id: &EntityId| -> String {
            tables
                .files
                .iter()
                .find(|f| &f.id == id)
                .map(|f| f.relative_path.clone())
                .unwrap_or_default()
        };

        let mut out = Vec::new();
        for f in tables.functions.iter().filter(|r| r.flags.exported) {
            out.push(crate::linking::RegistryEntry {
                name: f.name.clone(),
                id: f.id.clone(),
                file_id: f.owning_file.clone(),
                file_relative_path: relative_path_of(&f.owning_file),
            });
        }
        for c in tables.classes.iter().filter(|r| r.flags.exported) {
            out.push(crate::linking::RegistryEntry {
                name: c.name.clone(),
                id: c.id.clone(),
                file_id: c.owning_file.clone(),
                file_relative_path: relative_path_of(&c.owning_file),
            });
        }
        for i in tables.interfaces.iter().filter(|r| r.flags.exported) {
            out.push(crate::linking::RegistryEntry {
                name: i.name.clone(),
                id: i.id.clone(),
                file_id: i.owning_file.clone(),
                file_relative_path: relative_path_of(&i.owning_file),
            });
        }
        for t in tables.type_aliases.iter().filter(|r| r.exported) {
            out.push(crate::linking::RegistryEntry {
                name: t.name.clone(),
                id: t.id.clone(),
                file_id: t.owning_file.clone(),
                file_relative_path: relative_path_of(&t.owning_file),
            });
        }
        for v in tables.variables.iter().filter(|r| r.flags.exported) {
            out.push(crate::linking::RegistryEntry {
                name: v.name.clone(),
                id: v.id.clone(),
                file_id: v.owning_file.clone(),
                file_relative_path: relative_path_of(&v.owning_file),
            });
        }
        Ok(out)
    }

    /// Execute a declarative query, returning the projected rows.
    pub fn query(&self, script: &str, params: &Params) -> Result<Vec<Row>, StoreError> {
        self.require_ready()?;
        let parsed = query::parse(script)?;
        let tables = self.tables.read();
        let mirror = self.mirror.read();
        Ok(query::execute(&parsed, &tables, &mirror, params)?)
    }

    /// Like [`GraphStore::query`] but discards the projected rows — useful
    /// when a script's `WHERE`/`MATCH` is run purely for its parameter
    /// validation or side-effect-free dry run.
    pub fn execute(&self, script: &str, params: &Params) -> Result<(), StoreError> {
        self.query(script, params).map(|_| ())
    }

    /// Nearest-neighbor search over the entity-embedding index.
    pub fn vector_search(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>, StoreError> {
        self.require_ready()?;
        let tables = self.tables.read();
        Ok(vector::search(&tables, embedding, k)?)
    }

    /// Scoped transaction: snapshots the tables, runs `f` against `self`,
    /// and restores the snapshot (undoing any `write_batch`/`delete_file`
    /// calls the closure made, both in memory and on disk) if `f` returns
    /// an error.
    ///
    /// The bincode-snapshot relational layer has no write-ahead log, so this
    /// degrades to single-process, in-memory-snapshot atomicity rather than
    /// true multi-statement transactional isolation: concurrent readers
    /// during the closure's execution may observe intermediate writes. Each
    /// individual `write_batch`/`delete_file` call remains atomic on its
    /// own regardless of whether it runs inside a transaction.
    pub fn transaction<T>(&self, f: impl FnOnce(&GraphStore) -> Result<T, StoreError>) -> Result<T, StoreError> {
        self.require_ready()?;
        let snapshot = self.tables.read().clone();

        match f(self) {
            Ok(value) => {
                self.tables.read().persist(&self.base)?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(target: "store", "transaction rolled back: {e}");
                let mirror = GraphMirror::rebuild(&snapshot);
                *self.tables.write() = snapshot;
                *self.mirror.write() = mirror;
                self.tables.read().persist(&self.base)?;
                Err(e)
            }
        }
    }
}

fn read_schema_version(path: &Path) -> Result<u32, StoreError> {
    let raw = fs::read_to_string(path).map_err(|e| StoreError::Load {
        relation: SCHEMA_VERSION_FILE.to_string(),
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    raw.trim().parse::<u32>().map_err(|e| StoreError::Load {
        relation: SCHEMA_VERSION_FILE.to_string(),
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

fn write_schema_version(path: &Path, version: u32) -> Result<(), StoreError> {
    fs::write(path, version.to_string()).map_err(|e| StoreError::Persistence {
        relation: SCHEMA_VERSION_FILE.to_string(),
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}
