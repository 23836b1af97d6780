#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::uninlined_format_args
)]
//! Scry Search - file and object search across a local tree and a remote store.
//!
//! This crate finds files by name or content in two places at once: a
//! sandboxed local directory tree and a paginated remote object store reached
//! through [`scry_store::ObjectStore`]. It also turns approximate keys into
//! keys that really exist, for download, rename and delete flows.
//!
//! # Features
//!
//! - Substring, glob (`*`, `?`, `[...]`) and regex name matching
//! - Content matching with counts and previews, limited to text objects below
//!   a size ceiling, with a UTF-8 / Latin-1 / Windows-1252 decode chain
//! - Extension, size and modification-date filters
//! - Full pagination of the remote catalog with bounded concurrent fetches
//! - Deterministic ordering: name matches first, then newest first
//! - Cancellation and deadlines that return partial results
//! - Tiered key resolution with ranked candidates
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scry_search::{SearchConfig, SearchEngine, SearchQuery, SearchType};
//! use scry_store::FsStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SearchEngine::new(SearchConfig::new("/srv/files"))
//!         .with_store(Arc::new(FsStore::new("/srv/bucket")));
//!
//!     let outcome = engine
//!         .search(&SearchQuery::new("hello").search_type(SearchType::Content))
//!         .await?;
//!     for result in outcome.results {
//!         println!("{:?}: {}", result.match_count, result.record.path);
//!     }
//!
//!     for candidate in engine.resolve_key("report.pdf").await? {
//!         println!("{} ({:?})", candidate.key, candidate.reason);
//!     }
//!     Ok(())
//! }
//! ```

mod actions;
mod aggregate;
mod config;
mod content;
mod engine;
mod error;
mod local;
mod matcher;
mod query;
mod record;
mod remote;
mod resolver;
mod sandbox;

pub use actions::{FetchedObject, ObjectActions, RenameOutcome, ResolvePolicy, validate_new_name};
pub use aggregate::ResultAggregator;
pub use config::{
    CONTENT_SCAN_CEILING, RESOLVER_NAME_PREFIXES, RESOLVER_PREFIXES, SearchConfig, SearchConfigBuilder,
    TEXT_EXTENSIONS,
};
pub use content::{Charset, ContentInspector, ContentMatch, ContentPattern, DECODE_CHAIN, decode_text};
pub use engine::{NO_EXTENSION, SearchEngine, SearchOutcome, SourceCounts, SourceFailure};
pub use error::{SearchError, SearchResult};
pub use local::{LocalScan, LocalTreeWalker};
pub use matcher::Matcher;
pub use query::{CompiledQuery, ModifiedRange, SearchQuery, SearchType, SizeRange};
pub use record::{EntryKind, MatchResult, MatchType, ObjectRecord, Source, extension_of, record_id};
pub use remote::{RemoteCatalogScanner, RemoteScan, ScanCursor};
pub use resolver::{KeyResolver, ResolutionCandidate, ResolutionReason};
pub use sandbox::PathSandbox;
