//! # Keyhint Index
//!
//! Incremental, multi-source index of configuration-property metadata with
//! autocomplete resolution for partially typed dotted keys.
//!
//! ## Pipeline
//!
//! ```text
//! ClasspathEnvironment (modules, roots)
//!     │
//!     ├──> diff_sources (seen vs. current)
//!     │      └─> added / modified / removed roots
//!     │
//!     ├──> MetadataDocument (per changed root)
//!     │      └─> groups, then properties, then hints
//!     │
//!     └──> ScopeIndex per module + project aggregate
//!            ├─> RootIndex (sorted, prefix range)
//!            └─> MetadataTree (arena, owner sets)
//! ```
//!
//! Queries go the other way: ancestor keys locate a start node, the partial
//! segment is prefix-matched against sanitized children (falling back to any
//! depth), and leaf properties answer with their hinted values.
//!
//! ## Example
//!
//! ```
//! use keyhint_index::{InMemoryClasspath, IndexCoordinator, ReindexTarget, ScopeId};
//! use std::sync::Arc;
//!
//! let classpath = Arc::new(InMemoryClasspath::new());
//! classpath.put_root(
//!     "app",
//!     "boot.jar",
//!     Some(r#"{"properties":[{"name":"server.port","type":"java.lang.Integer"}]}"#),
//! );
//!
//! let coordinator = IndexCoordinator::new(classpath);
//! coordinator.reindex_now(&ReindexTarget::All).unwrap();
//!
//! let scope = ScopeId::module("app");
//! let suggestions = coordinator
//!     .compute_suggestions(&scope, Some(&["server"]), "po")
//!     .unwrap();
//! assert_eq!(suggestions[0].display_text, "port");
//! ```

mod config;
mod coordinator;
mod environment;
mod error;
mod generation;
mod root_index;
mod scope;
mod source;
mod stats;
mod suggestion;
mod tree;
mod watcher;
mod worker;

pub use config::{IndexConfig, DEFAULT_ADDITIONAL_METADATA_FILE, DEFAULT_METADATA_FILE};
pub use coordinator::{IndexCoordinator, ReindexTarget};
pub use environment::{
    discover_roots, is_archive, ClasspathEnvironment, FsClasspath, InMemoryClasspath,
    ModuleClasspath,
};
pub use error::{IndexError, Result};
pub use generation::{GenerationCounter, GenerationToken};
pub use root_index::RootIndex;
pub use scope::{InsertOutcome, ScopeId, ScopeIndex};
pub use source::{
    diff_sources, Fingerprint, SourceChange, SourceDescriptor, SourceDiff, SourceId,
};
pub use stats::{IndexStats, ScopeStats};
pub use suggestion::{Suggestion, SuggestionIcon, SuggestionKind};
pub use tree::{MetadataNode, MetadataRecord, MetadataTree, NodeId, NodeInfo};
pub use watcher::ClasspathWatcher;
pub use worker::{BackgroundIndexer, IndexUpdate, IndexerStatus, ReindexRequester};
