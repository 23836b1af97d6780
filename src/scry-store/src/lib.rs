//! Scry Store - the object store transport used by the search engine.
//!
//! Remote keys are opaque, path-like strings. Everything the engine needs from a
//! store is expressed by the [`ObjectStore`] trait:
//!
//! - paginated listing with an opaque continuation cursor
//! - existence checks
//! - whole or ranged object reads
//! - put, copy and delete for the key actions
//!
//! Two backends ship with the crate: [`MemoryStore`] (an ordered in-memory
//! bucket, handy for embedding and tests) and [`FsStore`] (a local directory
//! exposed as a flat bucket).
//!
//! # Example
//!
//! ```no_run
//! use scry_store::{MemoryStore, ObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> scry_store::StoreResult<()> {
//!     let store = MemoryStore::new();
//!     store.put_object("uploads/report.pdf", b"%PDF".to_vec().into()).await?;
//!
//!     let page = store.list_page(Some("uploads/"), None).await?;
//!     for entry in page.entries {
//!         println!("{} ({} bytes)", entry.key, entry.size);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod fs;
mod memory;
mod traits;
mod types;

pub use error::{StoreError, StoreResult};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use traits::ObjectStore;
pub use types::{ByteRange, ListPage, ObjectEntry};

/// Page size used by the bundled backends when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
