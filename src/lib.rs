//! A content-addressed code knowledge graph indexer: scan a repository,
//! extract its declarations and cross-references, link them into a queryable
//! graph, and serve declarative pattern queries and vector search over it.
//!
//! The pipeline is two-pass (`extraction` then `linking`), coordinated by
//! [`coordinator::Coordinator`] and persisted through [`store::GraphStore`].
//! The syntax parser and the embedding producer are external collaborators
//! (see [`parser_contract`] and [`embedding_contract`]); this crate pins
//! their contracts without shipping a concrete implementation of either.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod embedding_contract;
pub mod error;
pub mod extraction;
pub mod linking;
pub mod logging;
pub mod model;
pub mod parser_contract;
pub mod scanner;
pub mod store;
pub mod updater;
pub mod writer;

pub use config::Settings;
pub use coordinator::{Coordinator, CoordinatorConfig, IndexSummary, NullProgressSink, ProgressSink};
pub use store::GraphStore;
