//! Paginated scan over the whole remote catalog.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use scry_store::{ByteRange, ListPage, ObjectEntry, ObjectStore, StoreError};
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::content::{ContentInspector, ContentPattern};
use crate::error::{SearchError, SearchResult};
use crate::query::CompiledQuery;
use crate::record::{MatchResult, ObjectRecord, Source};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Position and tallies of an in-flight catalog scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor {
    /// Continuation token of the next page, `None` before the first page and
    /// after the last.
    pub token: Option<String>,
    /// The listing reported no further pages.
    pub exhausted: bool,
    /// Keys listed so far, directory markers included.
    pub objects_scanned: usize,
    pub matches_found: usize,
    pub pages: usize,
}

/// What a finished (or stopped) catalog scan produced.
#[derive(Debug, Default)]
pub struct RemoteScan {
    pub matches: Vec<MatchResult>,
    pub cursor: ScanCursor,
    /// The catalog was not fully covered.
    pub partial: bool,
    /// The scan stopped because it was cancelled.
    pub cancelled: bool,
    /// Human-readable notes on pages that could not be listed.
    pub failures: Vec<String>,
    /// Objects whose content or head could not be fetched.
    pub unreadable: usize,
}

/// Work left for one listed object after name matching.
enum Pending {
    Ready(MatchResult),
    Preview { record: ObjectRecord, key: String },
    Content { record: ObjectRecord, key: String },
}

/// Result of settling one pending item.
struct Settled {
    found: Option<MatchResult>,
    unreadable: bool,
}

impl Settled {
    fn found(found: Option<MatchResult>) -> Self {
        Self {
            found,
            unreadable: false,
        }
    }
}

enum PageFetch {
    Page(ListPage),
    Cancelled,
    Failed(StoreError),
}

/// Scans every key of the catalog, page by page, applying the query.
///
/// Matches keep listing order. Content fetches within a page run with bounded
/// concurrency and never touch objects above the scan ceiling.
#[derive(Debug, Clone)]
pub struct RemoteCatalogScanner {
    store: Arc<dyn ObjectStore>,
    inspector: ContentInspector,
    concurrency: usize,
    progress_interval: usize,
    page_retries: u32,
}

impl RemoteCatalogScanner {
    pub fn new(store: Arc<dyn ObjectStore>, config: &SearchConfig) -> Self {
        Self {
            store,
            inspector: ContentInspector::new(config),
            concurrency: config.content_concurrency.max(1),
            progress_interval: config.progress_interval.max(1),
            page_retries: config.page_retries,
        }
    }

    /// Runs the scan to the end of the catalog, a listing failure, or
    /// cancellation. Fails only when the very first page cannot be listed
    /// because the store is unreachable or refuses access.
    pub async fn scan(&self, query: &CompiledQuery, cancel: &CancellationToken) -> SearchResult<RemoteScan> {
        let mut scan = RemoteScan::default();

        while !scan.cursor.exhausted {
            if cancel.is_cancelled() {
                scan.cancelled = true;
                break;
            }

            let page = match self.fetch_page(scan.cursor.token.as_deref(), cancel).await {
                PageFetch::Page(page) => page,
                PageFetch::Cancelled => {
                    scan.cancelled = true;
                    break;
                }
                PageFetch::Failed(e) if e.is_fatal() && scan.cursor.pages == 0 => {
                    return Err(SearchError::source_unavailable(Source::Remote, e.to_string()));
                }
                PageFetch::Failed(e) => {
                    tracing::warn!("Listing stopped after {} pages: {}", scan.cursor.pages, e);
                    scan.failures.push(format!(
                        "listing stopped after {} pages: {}",
                        scan.cursor.pages, e
                    ));
                    break;
                }
            };

            scan.cursor.pages += 1;
            let pending: Vec<Pending> = page
                .entries
                .iter()
                .filter_map(|entry| {
                    scan.cursor.objects_scanned += 1;
                    if scan.cursor.objects_scanned % self.progress_interval == 0 {
                        tracing::info!(
                            "Scanned {} objects, {} matches so far",
                            scan.cursor.objects_scanned,
                            scan.cursor.matches_found
                        );
                    }
                    self.classify(entry, query)
                })
                .collect();

            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    scan.cancelled = true;
                    break;
                }
                settled = stream::iter(pending)
                    .map(|item| self.settle(item, query.content.as_ref()))
                    .buffered(self.concurrency)
                    .collect::<Vec<_>>() => settled,
            };

            let mut fatal = None;
            for outcome in settled {
                match outcome {
                    Ok(Settled { found, unreadable }) => {
                        if unreadable {
                            scan.unreadable += 1;
                        }
                        if let Some(found) = found {
                            scan.cursor.matches_found += 1;
                            scan.matches.push(found);
                        }
                    }
                    Err(e) => {
                        fatal.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = fatal {
                tracing::warn!("Object reads stopped on page {}: {}", scan.cursor.pages, e);
                scan.failures.push(format!(
                    "object reads stopped on page {}: {}",
                    scan.cursor.pages, e
                ));
                break;
            }

            scan.cursor.token = page.next_cursor;
            scan.cursor.exhausted = scan.cursor.token.is_none();
        }

        scan.partial = !scan.cursor.exhausted;
        tracing::debug!(
            "Catalog scan: {} objects over {} pages, {} matches{}",
            scan.cursor.objects_scanned,
            scan.cursor.pages,
            scan.cursor.matches_found,
            if scan.partial { " (partial)" } else { "" }
        );
        Ok(scan)
    }

    async fn fetch_page(&self, token: Option<&str>, cancel: &CancellationToken) -> PageFetch {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PageFetch::Cancelled,
                result = self.store.list_page(None, token) => result,
            };
            match result {
                Ok(page) => return PageFetch::Page(page),
                Err(e) if e.is_fatal() || attempt >= self.page_retries => return PageFetch::Failed(e),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!("Listing page failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }

    /// Applies filters and name matching; decides what still needs fetching.
    fn classify(&self, entry: &ObjectEntry, compiled: &CompiledQuery) -> Option<Pending> {
        if entry.is_directory_marker() {
            return None;
        }
        let name = entry.base_name();
        if !compiled.file_passes_filters(name, entry.size, entry.modified_at) {
            return None;
        }

        let query = &compiled.query;
        let record = ObjectRecord::remote(entry);
        let name_hit =
            query.is_wildcard() || (query.search_type.includes_name() && compiled.names.matches(name));

        if name_hit {
            if query.want_preview && self.inspector.is_scannable(name, entry.size) {
                return Some(Pending::Preview {
                    record,
                    key: entry.key.clone(),
                });
            }
            return Some(Pending::Ready(MatchResult::name(record)));
        }

        if compiled.content.is_some() && self.inspector.is_scannable(name, entry.size) {
            return Some(Pending::Content {
                record,
                key: entry.key.clone(),
            });
        }
        None
    }

    /// Performs the fetch a pending item needs. Unreadable objects are
    /// counted and skipped; connection and credential failures are returned.
    async fn settle(&self, item: Pending, pattern: Option<&ContentPattern>) -> Result<Settled, StoreError> {
        match item {
            Pending::Ready(found) => Ok(Settled::found(Some(found))),
            Pending::Preview { record, key } => {
                let range = ByteRange::first(self.inspector.head_len());
                match self.store.get_object(&key, Some(range)).await {
                    Ok(bytes) => {
                        let preview = self.inspector.head_preview(&bytes);
                        Ok(Settled::found(Some(MatchResult::name(record).with_preview(preview))))
                    }
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        tracing::debug!("No preview for {}: {}", key, e);
                        Ok(Settled {
                            found: Some(MatchResult::name(record)),
                            unreadable: true,
                        })
                    }
                }
            }
            Pending::Content { record, key } => {
                let Some(pattern) = pattern else {
                    return Ok(Settled::found(None));
                };
                // Listed sizes can be stale; never read past the ceiling.
                let range = ByteRange::first(self.inspector.ceiling());
                match self.store.get_object(&key, Some(range)).await {
                    Ok(bytes) => {
                        let found = self
                            .inspector
                            .scan(&bytes, pattern)
                            .map(|hit| MatchResult::content(record, hit.count, hit.preview));
                        Ok(Settled::found(found))
                    }
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        tracing::debug!("Skipping unreadable object {}: {}", key, e);
                        Ok(Settled {
                            found: None,
                            unreadable: true,
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SearchQuery, SearchType};
    use chrono::Utc;
    use scry_store::MemoryStore;

    fn scanner(store: Arc<MemoryStore>) -> RemoteCatalogScanner {
        RemoteCatalogScanner::new(store, &SearchConfig::default())
    }

    #[tokio::test]
    async fn test_directory_markers_are_counted_not_matched() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert("photos/", "", now);
        store.insert("photos/cat.jpg", "jpg", now);

        let compiled = SearchQuery::new("*").compile().unwrap();
        let scan = scanner(store).scan(&compiled, &CancellationToken::new()).await.unwrap();
        assert_eq!(scan.cursor.objects_scanned, 2);
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].record.path, "/photos/cat.jpg");
        assert!(!scan.partial);
    }

    #[tokio::test]
    async fn test_transient_listing_failure_is_retried() {
        let store = Arc::new(MemoryStore::with_page_size(2));
        let now = Utc::now();
        for key in ["a.txt", "b.txt", "c.txt"] {
            store.insert(key, "x", now);
        }
        store.fail_next_listings([StoreError::request("", "throttled")]);

        let compiled = SearchQuery::new("*").compile().unwrap();
        let scan = scanner(store.clone()).scan(&compiled, &CancellationToken::new()).await.unwrap();
        assert_eq!(scan.matches.len(), 3);
        assert!(scan.failures.is_empty());
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_persistent_listing_failure_yields_partial_scan() {
        let store = Arc::new(MemoryStore::with_page_size(1));
        let now = Utc::now();
        store.insert("a.txt", "x", now);
        store.insert("b.txt", "x", now);

        let compiled = SearchQuery::new("*").compile().unwrap();
        let scanner = scanner(store.clone());
        let cancel = CancellationToken::new();
        store.fail_next_listings((0..3).map(|_| StoreError::request("", "throttled")).collect::<Vec<_>>());

        let scan = scanner.scan(&compiled, &cancel).await.unwrap();
        assert!(scan.partial);
        assert_eq!(scan.failures.len(), 1);
        assert!(scan.matches.is_empty());
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(Some(StoreError::AccessDenied("bucket".into())));

        let compiled = SearchQuery::new("*").compile().unwrap();
        let err = scanner(store).scan(&compiled, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SearchError::SourceUnavailable { origin: Source::Remote, .. }));
    }

    #[tokio::test]
    async fn test_unreadable_object_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert("bad.txt", "needle", now);
        store.insert("good.txt", "needle", now);
        store.fail_reads_of("bad.txt", StoreError::request("bad.txt", "corrupt"));

        let compiled = SearchQuery::new("needle")
            .search_type(SearchType::Content)
            .compile()
            .unwrap();
        let scan = scanner(store).scan(&compiled, &CancellationToken::new()).await.unwrap();
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].record.name, "good.txt");
        assert_eq!(scan.unreadable, 1);
    }

    #[tokio::test]
    async fn test_revoked_credentials_stop_the_scan() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert("a.txt", "needle", now);
        store.insert("b.txt", "needle", now);
        store.fail_reads_of("a.txt", StoreError::AccessDenied("creds revoked".into()));

        let compiled = SearchQuery::new("needle")
            .search_type(SearchType::Content)
            .compile()
            .unwrap();
        let scan = scanner(store).scan(&compiled, &CancellationToken::new()).await.unwrap();
        assert!(scan.partial);
        assert_eq!(scan.failures.len(), 1);
        assert!(scan.failures[0].contains("creds revoked"));
        assert_eq!(scan.unreadable, 0);
    }

    /// Reports every object as one byte long, whatever it holds.
    #[derive(Debug)]
    struct StaleSizes(MemoryStore);

    #[async_trait::async_trait]
    impl ObjectStore for StaleSizes {
        async fn list_page(
            &self,
            prefix: Option<&str>,
            cursor: Option<&str>,
        ) -> scry_store::StoreResult<ListPage> {
            let mut page = self.0.list_page(prefix, cursor).await?;
            for entry in &mut page.entries {
                entry.size = 1;
            }
            Ok(page)
        }

        async fn head_exists(&self, key: &str) -> scry_store::StoreResult<bool> {
            self.0.head_exists(key).await
        }

        async fn get_object(
            &self,
            key: &str,
            range: Option<ByteRange>,
        ) -> scry_store::StoreResult<bytes::Bytes> {
            self.0.get_object(key, range).await
        }

        async fn put_object(&self, key: &str, data: bytes::Bytes) -> scry_store::StoreResult<()> {
            self.0.put_object(key, data).await
        }

        async fn copy_object(&self, src: &str, dest: &str) -> scry_store::StoreResult<()> {
            self.0.copy_object(src, dest).await
        }

        async fn delete_object(&self, key: &str) -> scry_store::StoreResult<()> {
            self.0.delete_object(key).await
        }
    }

    #[tokio::test]
    async fn test_content_reads_stop_at_ceiling() {
        let inner = MemoryStore::new();
        inner.insert("grown.txt", "needle ".repeat(10), Utc::now());
        let config = SearchConfig::builder(std::env::temp_dir())
            .content_scan_ceiling(16)
            .build();
        let scanner = RemoteCatalogScanner::new(Arc::new(StaleSizes(inner)), &config);

        let compiled = SearchQuery::new("needle")
            .search_type(SearchType::Content)
            .compile()
            .unwrap();
        let scan = scanner.scan(&compiled, &CancellationToken::new()).await.unwrap();
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].match_count, Some(2));
    }

    #[tokio::test]
    async fn test_cancelled_scan_is_partial() {
        let store = Arc::new(MemoryStore::new());
        store.insert("a.txt", "x", Utc::now());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let compiled = SearchQuery::new("*").compile().unwrap();
        let scan = scanner(store).scan(&compiled, &cancel).await.unwrap();
        assert!(scan.cancelled);
        assert!(scan.partial);
    }
}
