//! The transport seam between the engine and a concrete store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::types::{ByteRange, ListPage};

/// Minimal object store surface.
///
/// Implementations must be cheap to share (`Arc<dyn ObjectStore>`) and must
/// return keys in a stable order so that repeated listings of an unchanged
/// bucket are identical.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Lists one page of keys, optionally restricted to `prefix`, continuing
    /// after `cursor` when given.
    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage>;

    /// Returns whether `key` exists. A missing key is `Ok(false)`, not an error.
    async fn head_exists(&self, key: &str) -> StoreResult<bool>;

    /// Reads an object, or only `range` of it.
    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> StoreResult<Bytes>;

    /// Writes an object, replacing any existing one.
    async fn put_object(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// Copies `src` to `dest` within the same bucket.
    async fn copy_object(&self, src: &str, dest: &str) -> StoreResult<()>;

    /// Deletes an object.
    async fn delete_object(&self, key: &str) -> StoreResult<()>;
}
