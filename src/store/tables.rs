//! The durable relational layer: every node/edge relation as a typed row
//! vector, generalized from the teacher's split between a durable document
//! index and an in-memory graph — here the durable side is a flat,
//! `bincode`-snapshotted set of tables rather than a Tantivy index (see
//! DESIGN.md's §H trim note).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    Batch, CallsEdge, ClassRow, ContainsEdge, EmbeddingRow, EntityId, ExtendsEdge,
    ExtendsInterfaceEdge, FileRow, FunctionRow, GhostRow, HasMethodEdge, ImplementsEdge,
    ImportsEdge, InterfaceRow, ReferencesExternalEdge, TypeAliasRow, UsesTypeEdge, VariableRow,
};

/// All node/edge relations for one store, held as plain row vectors. No
/// relation is ever a recursive owned structure — cyclic edges (§9 design
/// note) are just rows keyed by `(from, to)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub files: Vec<FileRow>,
    pub functions: Vec<FunctionRow>,
    pub classes: Vec<ClassRow>,
    pub interfaces: Vec<InterfaceRow>,
    pub type_aliases: Vec<TypeAliasRow>,
    pub variables: Vec<VariableRow>,
    pub ghosts: Vec<GhostRow>,
    pub embeddings: Vec<EmbeddingRow>,

    pub contains: Vec<ContainsEdge>,
    pub calls: Vec<CallsEdge>,
    pub imports: Vec<ImportsEdge>,
    pub extends: Vec<ExtendsEdge>,
    pub implements: Vec<ImplementsEdge>,
    pub extends_interface: Vec<ExtendsInterfaceEdge>,
    pub has_method: Vec<HasMethodEdge>,
    pub uses_type: Vec<UsesTypeEdge>,
    pub references_external: Vec<ReferencesExternalEdge>,
}

/// The file names each table is snapshotted to, under `<base>/tables/`.
const RELATION_FILES: &[&str] = &[
    "files", "functions", "classes", "interfaces", "type_aliases", "variables", "ghosts",
    "embeddings", "contains", "calls", "imports", "extends", "implements", "extends_interface",
    "has_method", "uses_type", "references_external",
];

impl Tables {
    /// IDs of every entity this file owns: the file itself plus every
    /// top-level declaration whose `owning_file` is this file.
    pub fn owned_entity_ids(&self, file_id: &EntityId) -> HashSet<EntityId> {
        let mut owned = HashSet::new();
        owned.insert(file_id.clone());
        for f in self.functions.iter().filter(|r| &r.owning_file == file_id) {
            owned.insert(f.id.clone());
        }
        for c in self.classes.iter().filter(|r| &r.owning_file == file_id) {
            owned.insert(c.id.clone());
        }
        for i in self.interfaces.iter().filter(|r| &r.owning_file == file_id) {
            owned.insert(i.id.clone());
        }
        for t in self.type_aliases.iter().filter(|r| &r.owning_file == file_id) {
            owned.insert(t.id.clone());
        }
        for v in self.variables.iter().filter(|r| &r.owning_file == file_id) {
            owned.insert(v.id.clone());
        }
        owned
    }

    /// Delete every row transitively owned by `file_id`: the file's own
    /// entities, its embeddings, and every edge with an endpoint among them.
    /// Ghost rows are never removed here — they may still be referenced by
    /// other files (ghost uniqueness, §8 property 5).
    pub fn delete_file(&mut self, file_id: &EntityId) {
        let owned = self.owned_entity_ids(file_id);

        self.files.retain(|r| &r.id != file_id);
        self.functions.retain(|r| &r.owning_file != file_id);
        self.classes.retain(|r| &r.owning_file != file_id);
        self.interfaces.retain(|r| &r.owning_file != file_id);
        self.type_aliases.retain(|r| &r.owning_file != file_id);
        self.variables.retain(|r| &r.owning_file != file_id);
        self.embeddings.retain(|r| &r.file_id != file_id);

        self.contains.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.calls.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.imports.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.extends.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.implements.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.extends_interface
            .retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.has_method.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.uses_type.retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
        self.references_external
            .retain(|e| !owned.contains(&e.from) && !owned.contains(&e.to));
    }

    /// Apply one file's batch: delete whatever this file previously owned,
    /// then insert the new rows. A ghost already present (same dedup key,
    /// see `mint_ghost`) is not duplicated.
    pub fn apply_file_batch(&mut self, mut batch: Batch) {
        if let Some(file_id) = batch.file_id.clone() {
            self.delete_file(&file_id);
        }

        self.files.append(&mut batch.files);
        self.functions.append(&mut batch.functions);
        self.classes.append(&mut batch.classes);
        self.interfaces.append(&mut batch.interfaces);
        self.type_aliases.append(&mut batch.type_aliases);
        self.variables.append(&mut batch.variables);
        self.merge_ghosts(batch.ghosts);
        self.embeddings.append(&mut batch.embeddings);

        self.contains.append(&mut batch.contains);
        self.calls.append(&mut batch.calls);
        self.imports.append(&mut batch.imports);
        self.extends.append(&mut batch.extends);
        self.implements.append(&mut batch.implements);
        self.extends_interface.append(&mut batch.extends_interface);
        self.has_method.append(&mut batch.has_method);
        self.uses_type.append(&mut batch.uses_type);
        self.references_external.append(&mut batch.references_external);
    }

    /// Append the Pass-2 linker's global batch (edges plus any newly minted
    /// ghosts). Never deletes anything — this is pure append, chunked by the
    /// writer (§4.F) for the `calls` edges specifically.
    pub fn apply_global_batch(&mut self, mut batch: Batch) {
        self.merge_ghosts(batch.ghosts);
        self.calls.append(&mut batch.calls);
        self.extends.append(&mut batch.extends);
        self.implements.append(&mut batch.implements);
        self.extends_interface.append(&mut batch.extends_interface);
        self.uses_type.append(&mut batch.uses_type);
        self.references_external.append(&mut batch.references_external);
    }

    fn merge_ghosts(&mut self, ghosts: Vec<GhostRow>) {
        let existing: HashSet<EntityId> = self.ghosts.iter().map(|g| g.id.clone()).collect();
        for ghost in ghosts {
            if !existing.contains(&ghost.id) {
                self.ghosts.push(ghost);
            }
        }
    }

    pub fn entity_count(&self) -> usize {
        self.files.len()
            + self.functions.len()
            + self.classes.len()
            + self.interfaces.len()
            + self.type_aliases.len()
            + self.variables.len()
            + self.ghosts.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.contains.len()
            + self.calls.len()
            + self.imports.len()
            + self.extends.len()
            + self.implements.len()
            + self.extends_interface.len()
            + self.has_method.len()
            + self.uses_type.len()
            + self.references_external.len()
    }

    /// Byte-identical (modulo vector order) comparison used by the
    /// determinism tests — row order within each relation is not part of
    /// the contract, only membership.
    pub fn exported_function_ids(&self) -> HashMap<String, Vec<EntityId>> {
        let mut out: HashMap<String, Vec<EntityId>> = HashMap::new();
        for f in &self.functions {
            if f.flags.exported {
                out.entry(f.name.clone()).or_default().push(f.id.clone());
            }
        }
        out
    }

    fn table_dir(base: &Path) -> PathBuf {
        base.join("tables")
    }

    /// Snapshot every relation to `<base>/tables/<name>.bin`, write-temp then
    /// rename (the teacher's own `IndexPersistence::save` pattern).
    pub fn persist(&self, base: &Path) -> Result<(), StoreError> {
        let dir = Self::table_dir(base);
        fs::create_dir_all(&dir).map_err(|e| StoreError::Persistence {
            relation: "tables".to_string(),
            path: dir.clone(),
            source: Box::new(e),
        })?;

        macro_rules! write_relation {
            ($name:literal, $field:expr) => {{
                let path = dir.join(concat!($name, ".bin"));
                let data = bincode::serialize($field).map_err(|e| StoreError::Persistence {
                    relation: $name.to_string(),
                    path: path.clone(),
                    source: Box::new(e),
                })?;
                let temp = path.with_extension("bin.tmp");
                fs::write(&temp, &data).map_err(|e| StoreError::Persistence {
                    relation: $name.to_string(),
                    path: temp.clone(),
                    source: Box::new(e),
                })?;
                fs::rename(&temp, &path).map_err(|e| StoreError::Persistence {
                    relation: $name.to_string(),
                    path,
                    source: Box::new(e),
                })?;
            }};
        }

        write_relation!("files", &self.files);
        write_relation!("functions", &self.functions);
        write_relation!("classes", &self.classes);
        write_relation!("interfaces", &self.interfaces);
        write_relation!("type_aliases", &self.type_aliases);
        write_relation!("variables", &self.variables);
        write_relation!("ghosts", &self.ghosts);
        write_relation!("embeddings", &self.embeddings);
        write_relation!("contains", &self.contains);
        write_relation!("calls", &self.calls);
        write_relation!("imports", &self.imports);
        write_relation!("extends", &self.extends);
        write_relation!("implements", &self.implements);
        write_relation!("extends_interface", &self.extends_interface);
        write_relation!("has_method", &self.has_method);
        write_relation!("uses_type", &self.uses_type);
        write_relation!("references_external", &self.references_external);

        Ok(())
    }

    /// Load every relation present on disk; a relation file that does not
    /// exist yet (fresh store) loads as an empty vector rather than an
    /// error.
    pub fn load(base: &Path) -> Result<Self, StoreError> {
        let dir = Self::table_dir(base);
        let mut tables = Tables::default();
        if !dir.exists() {
            return Ok(tables);
        }

        macro_rules! read_relation {
            ($name:literal, $field:expr) => {{
                let path = dir.join(concat!($name, ".bin"));
                if path.exists() {
                    let bytes = fs::read(&path).map_err(|e| StoreError::Load {
                        relation: $name.to_string(),
                        path: path.clone(),
                        source: Box::new(e),
                    })?;
                    *$field = bincode::deserialize(&bytes).map_err(|e| StoreError::Load {
                        relation: $name.to_string(),
                        path,
                        source: Box::new(e),
                    })?;
                }
            }};
        }

        read_relation!("files", &mut tables.files);
        read_relation!("functions", &mut tables.functions);
        read_relation!("classes", &mut tables.classes);
        read_relation!("interfaces", &mut tables.interfaces);
        read_relation!("type_aliases", &mut tables.type_aliases);
        read_relation!("variables", &mut tables.variables);
        read_relation!("ghosts", &mut tables.ghosts);
        read_relation!("embeddings", &mut tables.embeddings);
        read_relation!("contains", &mut tables.contains);
        read_relation!("calls", &mut tables.calls);
        read_relation!("imports", &mut tables.imports);
        read_relation!("extends", &mut tables.extends);
        read_relation!("implements", &mut tables.implements);
        read_relation!("extends_interface", &mut tables.extends_interface);
        read_relation!("has_method", &mut tables.has_method);
        read_relation!("uses_type", &mut tables.uses_type);
        read_relation!("references_external", &mut tables.references_external);

        Ok(tables)
    }
}

/// Every relation name this layer persists, exposed for the schema-presence
/// check (`has_schema`).
pub fn relation_names() -> &'static [&'static str] {
    RELATION_FILES
}
