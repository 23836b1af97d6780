//! A local directory exposed as a flat bucket.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use walkdir::{DirEntry, WalkDir};

use crate::DEFAULT_PAGE_SIZE;
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;
use crate::types::{ByteRange, ListPage, ObjectEntry};

/// Directory-backed store.
///
/// Every regular file below `root` is an object whose key is its relative
/// path joined with `/`. Keys are listed in lexicographic order and the
/// cursor is the last key returned.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    page_size: usize,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto the bucket directory, rejecting anything that could
    /// leave it.
    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Collects one page of keys after `cursor`.
    ///
    /// Siblings are visited in the order of their key prefixes (`name` for
    /// files, `name/` for directories), which makes the walk yield keys in
    /// byte order. Subtrees that lie entirely at or before the cursor, or
    /// outside `prefix`, are never entered, and the walk stops one key past
    /// the page.
    fn collect_page(
        root: &Path,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> StoreResult<ListPage> {
        if !root.is_dir() {
            return Err(StoreError::Connection(format!(
                "bucket directory '{}' is not available",
                root.display()
            )));
        }

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by(|a, b| sort_name(a).cmp(&sort_name(b)))
            .into_iter();

        let mut entries: Vec<ObjectEntry> = Vec::new();
        let mut has_more = false;
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!("Skipping unreadable bucket entry: {}", err);
                    continue;
                }
            };
            let Some(key) = key_of(root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                let subtree = format!("{key}/");
                let outside_prefix = !subtree.starts_with(prefix) && !prefix.starts_with(&subtree);
                if outside_prefix || cursor.is_some_and(|c| subtree_precedes(&subtree, c)) {
                    walker.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file()
                || !key.starts_with(prefix)
                || cursor.is_some_and(|c| key.as_str() <= c)
            {
                continue;
            }

            if entries.len() == page_size {
                has_more = true;
                break;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!("Skipping '{}': {}", key, err);
                    continue;
                }
            };
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(ObjectEntry::new(key, metadata.len(), modified_at));
        }

        let next_cursor = match (has_more, entries.last()) {
            (true, Some(last)) => Some(last.key.clone()),
            _ => None,
        };
        Ok(ListPage {
            entries,
            next_cursor,
        })
    }
}

/// Name used to order siblings: directories sort as their `name/` prefix.
fn sort_name(entry: &DirEntry) -> String {
    let mut name = entry.file_name().to_string_lossy().into_owned();
    if entry.file_type().is_dir() {
        name.push('/');
    }
    name
}

/// `/`-joined path of `path` relative to `root`.
fn key_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Every key starting with `subtree` sorts at or before `cursor`.
fn subtree_precedes(subtree: &str, cursor: &str) -> bool {
    subtree < cursor && !cursor.starts_with(subtree)
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage> {
        let root = self.root.clone();
        let prefix = prefix.unwrap_or("").to_string();
        let cursor = cursor.map(str::to_string);
        let page_size = self.page_size;
        tokio::task::spawn_blocking(move || {
            Self::collect_page(&root, &prefix, cursor.as_deref(), page_size)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("listing task failed: {e}")))?
    }

    async fn head_exists(&self, key: &str) -> StoreResult<bool> {
        let path = match self.object_path(key) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::from_io(key, &err)),
        }
    }

    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> StoreResult<Bytes> {
        let path = self.object_path(key)?;
        let Some(range) = range else {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| StoreError::from_io(key, &e))?;
            return Ok(Bytes::from(data));
        };

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StoreError::from_io(key, &e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StoreError::from_io(key, &e))?
            .len();
        let span = range.clamp(usize::try_from(size).unwrap_or(usize::MAX));
        file.seek(std::io::SeekFrom::Start(span.start as u64))
            .await
            .map_err(|e| StoreError::from_io(key, &e))?;
        let mut buf = vec![0u8; span.len()];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| StoreError::from_io(key, &e))?;
        Ok(Bytes::from(buf))
    }

    async fn put_object(&self, key: &str, data: Bytes) -> StoreResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(key, &e))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::from_io(key, &e))
    }

    async fn copy_object(&self, src: &str, dest: &str) -> StoreResult<()> {
        let from = self.object_path(src)?;
        let to = self.object_path(dest)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(dest, &e))?;
        }
        tokio::fs::copy(&from, &to)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_io(src, &e))
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        let path = self.object_path(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::from_io(key, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bucket() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads/nested")).unwrap();
        std::fs::write(dir.path().join("uploads/a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("uploads/nested/b.txt"), "beta").unwrap();
        std::fs::write(dir.path().join("root.md"), "# root").unwrap();
        let store = FsStore::new(dir.path()).with_page_size(2);
        (dir, store)
    }

    #[tokio::test]
    async fn test_listing_is_ordered_and_paginated() {
        let (_dir, store) = bucket();

        let first = store.list_page(None, None).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        let second = store
            .list_page(None, first.next_cursor.as_deref())
            .await
            .unwrap();
        assert!(second.is_last());

        let keys: Vec<_> = first
            .entries
            .iter()
            .chain(second.entries.iter())
            .map(|e| e.key.clone())
            .collect();
        assert_eq!(keys, vec!["root.md", "uploads/a.txt", "uploads/nested/b.txt"]);
    }

    #[tokio::test]
    async fn test_listing_follows_key_order_across_folders() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("skip/deep")).unwrap();
        std::fs::write(dir.path().join("a/z.txt"), "1").unwrap();
        std::fs::write(dir.path().join("a-c.txt"), "2").unwrap();
        std::fs::write(dir.path().join("a0.txt"), "3").unwrap();
        std::fs::write(dir.path().join("skip/deep/x.txt"), "4").unwrap();
        let store = FsStore::new(dir.path()).with_page_size(1);

        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = store.list_page(None, cursor.as_deref()).await.unwrap();
            assert!(page.entries.len() <= 1);
            keys.extend(page.entries.iter().map(|e| e.key.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(keys, vec!["a-c.txt", "a/z.txt", "a0.txt", "skip/deep/x.txt"]);

        let uploads = store.list_page(Some("skip/"), None).await.unwrap();
        assert_eq!(uploads.entries.len(), 1);
        assert!(uploads.is_last());
    }

    #[test]
    fn test_subtree_precedes() {
        assert!(subtree_precedes("a/", "b.txt"));
        assert!(!subtree_precedes("a/", "a/m.txt"));
        assert!(!subtree_precedes("c/", "b.txt"));
        assert!(!subtree_precedes("a/", "a-c.txt"));
    }

    #[tokio::test]
    async fn test_ranged_get_and_head() {
        let (_dir, store) = bucket();
        assert!(store.head_exists("uploads/a.txt").await.unwrap());
        assert!(!store.head_exists("uploads/missing.txt").await.unwrap());
        assert!(!store.head_exists("../escape").await.unwrap());

        let part = store
            .get_object("uploads/a.txt", Some(ByteRange::first(3)))
            .await
            .unwrap();
        assert_eq!(&part[..], b"alp");
    }

    #[tokio::test]
    async fn test_copy_put_delete() {
        let (_dir, store) = bucket();
        store
            .put_object("fresh/new.txt", Bytes::from_static(b"new"))
            .await
            .unwrap();
        store.copy_object("fresh/new.txt", "fresh/copy.txt").await.unwrap();
        store.delete_object("fresh/new.txt").await.unwrap();

        assert!(!store.head_exists("fresh/new.txt").await.unwrap());
        let copy = store.get_object("fresh/copy.txt", None).await.unwrap();
        assert_eq!(&copy[..], b"new");
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (_dir, store) = bucket();
        let err = store.get_object("../etc/passwd", None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_missing_bucket_is_fatal() {
        let store = FsStore::new("/nonexistent/scry-bucket");
        assert!(store.list_page(None, None).await.unwrap_err().is_fatal());
    }
}
