//! Configuration module for the code knowledge graph indexer.
//!
//! Layered configuration: defaults, then a TOML file, then environment
//! variable overrides.
//!
//! # Environment variables
//!
//! Environment variables must be prefixed with `CODEGRAPH_` and use double
//! underscores to separate nested levels:
//! - `CODEGRAPH_INDEXING__CONCURRENCY=8` sets `indexing.concurrency`
//! - `CODEGRAPH_STORE__PATH=/tmp/graph` sets `store.path`
//! - `CODEGRAPH_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where the graph store's persisted tables live.
    #[serde(default)]
    pub store: StoreConfig,

    /// Scan/coordinator settings.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Embedding producer settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Bounded worker count for the coordinator's file pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// File batch size per wave of the worker pool.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// When false, the coordinator stops dispatching new files after the
    /// first recoverable error.
    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Include globs, matched against the repo-relative path.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Exclude globs, matched against the repo-relative path.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Whether embeddings are generated during indexing at all. Disabled by
    /// default: the embedding producer is an external collaborator (see
    /// `embedding_contract`), and not every caller wires one in.
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// Identifier recorded on every `EmbeddingRow` for provenance.
    #[serde(default = "default_model_id")]
    pub model_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `"warn"` or `"info"`.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module filter overrides, merged in as `module=level`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_store_path() -> PathBuf {
    PathBuf::from(".codegraph/store")
}
fn default_concurrency() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_exclude() -> Vec<String> {
    vec![
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
    ]
}
fn default_model_id() -> String {
    "none".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: StoreConfig::default(),
            indexing: IndexingConfig::default(),
            embedding: EmbeddingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            continue_on_error: true,
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_id: default_model_id(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources: defaults, then
    /// `.codegraph/settings.toml` (found by walking up from the current
    /// directory) if present, then `CODEGRAPH_`-prefixed environment
    /// variables.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| PathBuf::from(".codegraph/settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration layered on top of a specific TOML file (which need
    /// not exist — figment treats a missing file as an empty layer).
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CODEGRAPH_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    /// Walk up from the current directory looking for a `.codegraph`
    /// directory, the way the coordinator's CLI locates a workspace it was
    /// invoked from a subdirectory of.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codegraph");
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }
        None
    }

    /// Persist the current settings as TOML at `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
