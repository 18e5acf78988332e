//! Command-line surface over [`crate::store::GraphStore`].
//!
//! `index`/`incremental-index` are intentionally absent from this binary:
//! the syntax parser is an external collaborator (see
//! `crate::parser_contract`) and this crate ships no concrete grammar.
//! Embedders wire a [`crate::parser_contract::SyntaxParser`] and drive
//! [`crate::coordinator::Coordinator`] themselves; this CLI only operates on
//! a store that already exists.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::store::query::{ParamValue, Params};
use crate::store::GraphStore;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query a content-addressed code knowledge graph")]
pub struct Cli {
    /// Path to the graph store directory (overrides config).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file.
    Init {
        #[arg(short, long)]
        force: bool,
    },

    /// Print the resolved configuration.
    Config,

    /// Run a declarative pattern query against the store.
    Query {
        /// `MATCH (...) [WHERE ...] RETURN ...` script.
        script: String,

        /// Named parameters as `key=value`. Values parse as int, then
        /// float, then bool, then fall back to a string.
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,
    },

    /// Print entity/relationship counts for the store.
    Stats,

    /// Nearest-neighbor search over the entity-embedding index.
    VectorSearch {
        /// Comma-separated `f32` vector, e.g. `0.1,0.2,0.3`.
        #[arg(long)]
        vector: String,

        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let parsed = if let Ok(i) = value.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ParamValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        ParamValue::Bool(b)
    } else {
        ParamValue::String(value.to_string())
    };
    Ok((key.to_string(), parsed))
}

/// Run the parsed CLI against `settings`, opening the store at
/// `cli.store` (falling back to `settings.store.path`).
pub fn run(cli: Cli, settings: Settings) -> Result<()> {
    if let Commands::Init { force } = &cli.command {
        let config_path = PathBuf::from(".codegraph/settings.toml");
        if config_path.exists() && !*force {
            bail!("configuration file already exists at {}; use --force to overwrite", config_path.display());
        }
        Settings::default().save(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    if let Commands::Config = &cli.command {
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    let store_path = cli.store.unwrap_or_else(|| settings.store.path.clone());
    let store = GraphStore::new(&store_path);
    store
        .initialize()
        .with_context(|| format!("failed to open store at {}", store_path.display()))?;

    match cli.command {
        Commands::Init { .. } | Commands::Config => unreachable!("handled above"),
        Commands::Query { script, params } => {
            let mut bound = Params::new();
            for (key, value) in params {
                bound.insert(key, value);
            }
            let rows = store.query(&script, &bound)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Stats => {
            let files = store.file_rows()?;
            let exports = store.exported_symbols()?;
            println!("files: {}", files.len());
            println!("exported symbols: {}", exports.len());
        }
        Commands::VectorSearch { vector, k } => {
            let parsed: Result<Vec<f32>, _> = vector.split(',').map(|s| s.trim().parse::<f32>()).collect();
            let parsed = parsed.context("vector must be a comma-separated list of floats")?;
            let hits = store.vector_search(&parsed, k)?;
            for hit in hits {
                match hit.name {
                    Some(name) => println!("{}\t{:.6}\t{}", hit.entity_id, hit.distance, name),
                    None => println!("{}\t{:.6}", hit.entity_id, hit.distance),
                }
            }
        }
    }

    Ok(())
}
