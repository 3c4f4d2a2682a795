//! Vaultgraph - an in-memory index and query engine for Obsidian-style vaults.
//!
//! # Overview
//!
//! Vaultgraph scans a directory tree of Markdown notes and keeps:
//! - Parsed notes (front matter, tags, aliases, headings, links)
//! - A link graph with exact forward and backward edges, where dangling
//!   links resolve on their own as soon as a matching note appears
//! - Tag and folder indexes for fast filtering
//!
//! Filesystem changes flow through a bounded change feed into the index, and
//! a [`QueryEngine`] answers full-text, tag, front matter, date, path and
//! link queries from consistent snapshots.
//!
//! # Example
//!
//! ```no_run
//! use vaultgraph::{IndexConfig, Indexer};
//! use vaultgraph::query::TagQueryOptions;
//!
//! let (indexer, report) = Indexer::build("/path/to/vault", IndexConfig::default()).unwrap();
//! println!("indexed {} notes", report.notes_indexed);
//!
//! let query = indexer.query();
//! for link in query.broken_links() {
//!     println!("{} -> {}", link.source, link.link.target);
//! }
//! let tagged = query.tags("proj/* AND NOT draft", &TagQueryOptions::default()).unwrap();
//! println!("{} project notes", tagged.len());
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod note;
pub mod parser;
pub mod query;
pub mod scanner;
pub mod types;
pub mod value;
pub mod vault;
pub mod watch;

// Re-export main types at crate root
pub use config::{CaseRule, IndexConfig};
pub use error::{ParseError, QueryError, Result, VaultError};
pub use index::{UpsertOutcome, VaultIndex};
pub use note::Note;
pub use query::QueryEngine;
pub use scanner::{BuildReport, ChangeEvent, ChangeKind, ChangeOutcome, Indexer};
pub use types::*;
pub use value::FieldValue;
pub use vault::Vault;
pub use watch::{ChangeFeed, Dispatcher, FsWatcher, WatchSession};
