//! In-memory object store.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::DEFAULT_PAGE_SIZE;
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;
use crate::types::{ByteRange, ListPage, ObjectEntry};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    modified_at: DateTime<Utc>,
}

/// Injected failures, consumed by the trait methods.
#[derive(Debug, Default)]
struct Faults {
    offline: Option<StoreError>,
    listing_failures: Vec<StoreError>,
    get_failures: HashMap<String, StoreError>,
}

/// An ordered bucket held in memory.
///
/// Keys are listed in lexicographic order; the cursor is the last key of the
/// previous page. Failures can be injected to exercise callers' recovery
/// paths, and every `get_object` call is recorded.
#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    faults: Mutex<Faults>,
    get_log: Mutex<Vec<String>>,
    list_calls: Mutex<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store returning at most `page_size` keys per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            faults: Mutex::new(Faults::default()),
            get_log: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
        }
    }

    /// Inserts an object with an explicit modification time.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>, modified_at: DateTime<Utc>) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                modified_at,
            },
        );
    }

    /// Number of stored objects, directory markers included.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Makes every call fail with `error` until cleared with `None`.
    pub fn set_offline(&self, error: Option<StoreError>) {
        self.faults.lock().offline = error;
    }

    /// Makes the next listing calls fail, one error per call.
    pub fn fail_next_listings(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.faults.lock().listing_failures.extend(errors);
    }

    /// Makes every read of `key` fail with `error`.
    pub fn fail_reads_of(&self, key: impl Into<String>, error: StoreError) {
        self.faults.lock().get_failures.insert(key.into(), error);
    }

    /// Keys requested through `get_object`, in call order.
    pub fn read_log(&self) -> Vec<String> {
        self.get_log.lock().clone()
    }

    /// Number of `list_page` calls served or failed so far.
    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock()
    }

    fn check_online(&self) -> StoreResult<()> {
        match &self.faults.lock().offline {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage> {
        *self.list_calls.lock() += 1;
        self.check_online()?;
        {
            let mut faults = self.faults.lock();
            if !faults.listing_failures.is_empty() {
                return Err(faults.listing_failures.remove(0));
            }
        }

        let objects = self.objects.read();
        let lower = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };
        let prefix = prefix.unwrap_or("");

        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(prefix));

        let entries: Vec<ObjectEntry> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, obj)| ObjectEntry::new(key.clone(), obj.data.len() as u64, obj.modified_at))
            .collect();

        let next_cursor = match (matching.next(), entries.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ListPage {
            entries,
            next_cursor,
        })
    }

    async fn head_exists(&self, key: &str) -> StoreResult<bool> {
        self.check_online()?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> StoreResult<Bytes> {
        self.get_log.lock().push(key.to_string());
        self.check_online()?;
        if let Some(err) = self.faults.lock().get_failures.get(key) {
            return Err(err.clone());
        }

        let objects = self.objects.read();
        let object = objects.get(key).ok_or_else(|| StoreError::not_found(key))?;
        Ok(match range {
            Some(range) => object.data.slice(range.clamp(object.data.len())),
            None => object.data.clone(),
        })
    }

    async fn put_object(&self, key: &str, data: Bytes) -> StoreResult<()> {
        self.check_online()?;
        self.insert(key, data, Utc::now());
        Ok(())
    }

    async fn copy_object(&self, src: &str, dest: &str) -> StoreResult<()> {
        self.check_online()?;
        let mut objects = self.objects.write();
        let object = objects.get(src).cloned().ok_or_else(|| StoreError::not_found(src))?;
        objects.insert(
            dest.to_string(),
            StoredObject {
                data: object.data,
                modified_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.check_online()?;
        match self.objects.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(page_size: usize, count: usize) -> MemoryStore {
        let store = MemoryStore::with_page_size(page_size);
        let now = Utc::now();
        for i in 0..count {
            store.insert(format!("k{i:04}"), vec![b'x'; i % 7], now);
        }
        store
    }

    #[tokio::test]
    async fn test_pagination_covers_every_key_once() {
        let store = seeded(10, 25);
        let mut cursor: Option<String> = None;
        let mut seen = Vec::new();
        let mut pages = 0;

        loop {
            let page = store.list_page(None, cursor.as_deref()).await.unwrap();
            pages += 1;
            seen.extend(page.entries.iter().map(|e| e.key.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 25);
        let mut sorted = seen.clone();
        sorted.dedup();
        assert_eq!(sorted, seen);
    }

    #[tokio::test]
    async fn test_exact_page_boundary_has_no_trailing_cursor() {
        let store = seeded(5, 10);
        let first = store.list_page(None, None).await.unwrap();
        let second = store.list_page(None, first.next_cursor.as_deref()).await.unwrap();
        assert_eq!(second.entries.len(), 5);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert("uploads/a.txt", "a", now);
        store.insert("uploads/b.txt", "b", now);
        store.insert("media/c.png", "c", now);

        let page = store.list_page(Some("uploads/"), None).await.unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["uploads/a.txt", "uploads/b.txt"]);
    }

    #[tokio::test]
    async fn test_ranged_read() {
        let store = MemoryStore::new();
        store.insert("a.txt", "hello world", Utc::now());

        let head = store.get_object("a.txt", Some(ByteRange::first(5))).await.unwrap();
        assert_eq!(&head[..], b"hello");
        assert_eq!(store.read_log(), vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let store = MemoryStore::new();
        store.insert("a.txt", "data", Utc::now());

        store.copy_object("a.txt", "b.txt").await.unwrap();
        store.delete_object("a.txt").await.unwrap();

        assert!(!store.head_exists("a.txt").await.unwrap());
        assert!(store.head_exists("b.txt").await.unwrap());
        assert!(store.delete_object("a.txt").await.unwrap_err().is_missing());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = seeded(10, 3);
        store.fail_next_listings([StoreError::request("", "throttled")]);
        assert!(store.list_page(None, None).await.is_err());
        assert!(store.list_page(None, None).await.is_ok());

        store.fail_reads_of("k0001", StoreError::request("k0001", "corrupt"));
        assert!(store.get_object("k0001", None).await.is_err());

        store.set_offline(Some(StoreError::Connection("down".into())));
        assert!(store.head_exists("k0000").await.unwrap_err().is_fatal());
    }
}
