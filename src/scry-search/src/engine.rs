//! The search engine: fans a query out to the selected sources and merges
//! what they find.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use scry_store::ObjectStore;

use crate::actions::ObjectActions;
use crate::aggregate::ResultAggregator;
use crate::config::SearchConfig;
use crate::content::ContentInspector;
use crate::error::{SearchError, SearchResult};
use crate::local::{LocalScan, LocalTreeWalker};
use crate::query::{CompiledQuery, SearchQuery};
use crate::record::{EntryKind, MatchResult, Source};
use crate::remote::{RemoteCatalogScanner, RemoteScan};
use crate::resolver::{KeyResolver, ResolutionCandidate};
use crate::sandbox::PathSandbox;

/// Bucket used by [`SearchOutcome::extension_breakdown`] for files without
/// an extension.
pub const NO_EXTENSION: &str = "no extension";

/// Result count per source, before truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub local: usize,
    pub remote: usize,
}

/// A source that failed while the search as a whole went on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: Source,
    pub message: String,
}

/// Everything a search produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Name matches first, then content matches, newest first within each.
    pub results: Vec<MatchResult>,
    /// Local entries visited plus remote keys listed.
    pub total_scanned: usize,
    pub per_source_counts: SourceCounts,
    /// `max_results` cut the result list.
    pub truncated: bool,
    /// Cancelled, timed out, or a listing could not be completed.
    pub partial: bool,
    pub failures: Vec<SourceFailure>,
}

impl SearchOutcome {
    /// Number of file results per extension.
    pub fn extension_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        for result in self.results.iter().filter(|r| r.record.kind == EntryKind::File) {
            let ext = result.record.extension.as_deref().unwrap_or(NO_EXTENSION);
            *breakdown.entry(ext.to_string()).or_insert(0) += 1;
        }
        breakdown
    }
}

/// Cancels the search when the deadline passes; stops the timer on drop.
struct DeadlineGuard(Option<JoinHandle<()>>);

impl DeadlineGuard {
    fn arm(query: &SearchQuery, cancel: &CancellationToken) -> Self {
        Self(query.deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::info!("Search deadline of {:?} reached, cancelling", deadline);
                cancel.cancel();
            })
        }))
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(timer) = self.0.take() {
            timer.abort();
        }
    }
}

/// Multi-source search engine.
///
/// Every call is self-contained: nothing is cached between searches.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use scry_search::{SearchConfig, SearchEngine, SearchQuery, SearchType};
/// use scry_store::MemoryStore;
///
/// # async fn run() -> scry_search::SearchResult<()> {
/// let engine = SearchEngine::new(SearchConfig::new("/srv/files"))
///     .with_store(Arc::new(MemoryStore::new()));
/// let outcome = engine
///     .search(&SearchQuery::new("invoice").search_type(SearchType::Both))
///     .await?;
/// for result in &outcome.results {
///     println!("{} {}", result.record.source, result.record.path);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SearchEngine {
    config: SearchConfig,
    store: Option<Arc<dyn ObjectStore>>,
}

impl SearchEngine {
    /// Creates an engine with only the local source.
    pub fn new(config: SearchConfig) -> Self {
        Self { config, store: None }
    }

    /// Attaches the remote object store.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs `query` to completion (or its deadline).
    pub async fn search(&self, query: &SearchQuery) -> SearchResult<SearchOutcome> {
        self.search_with_cancel(query, CancellationToken::new()).await
    }

    /// Runs `query` until done or until `cancel` fires, in which case the
    /// results gathered so far are returned marked partial.
    ///
    /// Invalid patterns and sandbox escapes fail the call before anything is
    /// scanned. A failing source is reported in `failures` unless every
    /// selected source failed.
    pub async fn search_with_cancel(
        &self,
        query: &SearchQuery,
        cancel: CancellationToken,
    ) -> SearchResult<SearchOutcome> {
        let started = Instant::now();
        let compiled = Arc::new(query.compile()?);
        let cancel = cancel.child_token();
        let _deadline = DeadlineGuard::arm(query, &cancel);

        tracing::info!(
            "Searching for '{}' ({:?}) in {:?}",
            query.text,
            query.search_type,
            query.sources
        );

        // Sandbox violations fail the search before either source is scanned.
        let local_start = if query.selects(Source::Local) {
            match self.open_local(&query.search_path).await {
                Err(e) if e.is_operation_level() => return Err(e),
                opened => Some(opened),
            }
        } else {
            None
        };

        let local = async {
            match local_start {
                Some(Ok((sandbox, start))) => {
                    Some(self.scan_local(sandbox, start, compiled.clone(), cancel.clone()).await)
                }
                Some(Err(e)) => Some(Err(e)),
                None => None,
            }
        };
        let remote = async {
            if query.selects(Source::Remote) {
                Some(self.scan_remote(&compiled, &cancel).await)
            } else {
                None
            }
        };
        let (local, remote) = tokio::join!(local, remote);

        let mut errors: Vec<(Source, SearchError)> = Vec::new();
        let mut selected = 0;
        let local = match local {
            Some(Ok(scan)) => {
                selected += 1;
                scan
            }
            Some(Err(e)) => {
                selected += 1;
                errors.push((Source::Local, e));
                LocalScan::default()
            }
            None => LocalScan::default(),
        };
        let remote = match remote {
            Some(Ok(scan)) => {
                selected += 1;
                scan
            }
            Some(Err(e)) => {
                selected += 1;
                errors.push((Source::Remote, e));
                RemoteScan::default()
            }
            None => RemoteScan::default(),
        };

        if let Some(pos) = errors.iter().position(|(_, e)| e.is_operation_level()) {
            return Err(errors.swap_remove(pos).1);
        }
        if selected > 0 && errors.len() == selected {
            let (source, first) = errors.remove(0);
            tracing::warn!("Every selected source failed, first was {}: {}", source, first);
            return Err(first);
        }

        let mut failures: Vec<SourceFailure> = errors
            .into_iter()
            .map(|(source, e)| {
                tracing::warn!("{} source failed: {}", source, e);
                SourceFailure {
                    source,
                    message: e.to_string(),
                }
            })
            .collect();
        failures.extend(remote.failures.iter().map(|message| SourceFailure {
            source: Source::Remote,
            message: message.clone(),
        }));

        let per_source_counts = SourceCounts {
            local: local.matches.len(),
            remote: remote.matches.len(),
        };
        let total_scanned = local.scanned + remote.cursor.objects_scanned;
        let partial = local.cancelled || remote.partial;
        let (results, truncated) = ResultAggregator::new(query.max_results).merge(local.matches, remote.matches);

        tracing::info!(
            "Search finished in {:?}: {} results from {} scanned{}",
            started.elapsed(),
            results.len(),
            total_scanned,
            if partial { " (partial)" } else { "" }
        );

        Ok(SearchOutcome {
            results,
            total_scanned,
            per_source_counts,
            truncated,
            partial,
            failures,
        })
    }

    /// Resolves an approximate key against the remote store.
    pub async fn resolve_key(&self, requested: &str) -> SearchResult<Vec<ResolutionCandidate>> {
        self.resolve_key_with_cancel(requested, CancellationToken::new()).await
    }

    /// Resolves until done or until `cancel` fires, returning the candidates
    /// found up to that point.
    pub async fn resolve_key_with_cancel(
        &self,
        requested: &str,
        cancel: CancellationToken,
    ) -> SearchResult<Vec<ResolutionCandidate>> {
        let store = self.require_store()?;
        Ok(KeyResolver::new(store, &self.config)
            .resolve_with_cancel(requested, &cancel)
            .await)
    }

    /// Download, rename and delete by approximate key.
    pub fn actions(&self) -> SearchResult<ObjectActions> {
        Ok(ObjectActions::new(self.require_store()?, &self.config))
    }

    fn require_store(&self) -> SearchResult<Arc<dyn ObjectStore>> {
        self.store
            .clone()
            .ok_or_else(|| SearchError::source_unavailable(Source::Remote, "no object store configured"))
    }

    /// Opens the sandbox and resolves the local starting directory.
    async fn open_local(&self, search_path: &str) -> SearchResult<(PathSandbox, PathBuf)> {
        let root = self.config.root.clone();
        let create = self.config.create_missing_search_path;
        let search_path = search_path.to_string();

        tokio::task::spawn_blocking(move || {
            let sandbox = PathSandbox::new(&root)?;
            let start = sandbox.resolve(&search_path, create)?;
            if !start.is_dir() {
                return Err(SearchError::source_unavailable(
                    Source::Local,
                    format!("search path '{search_path}' is not a directory"),
                ));
            }
            Ok((sandbox, start))
        })
        .await
        .map_err(|e| SearchError::TaskFailed(e.to_string()))?
    }

    async fn scan_local(
        &self,
        sandbox: PathSandbox,
        start: PathBuf,
        compiled: Arc<CompiledQuery>,
        cancel: CancellationToken,
    ) -> SearchResult<LocalScan> {
        let inspector = ContentInspector::new(&self.config);
        tokio::task::spawn_blocking(move || LocalTreeWalker::new(&start, sandbox, compiled, inspector, cancel).run())
            .await
            .map_err(|e| SearchError::TaskFailed(e.to_string()))
    }

    async fn scan_remote(&self, compiled: &CompiledQuery, cancel: &CancellationToken) -> SearchResult<RemoteScan> {
        let store = self.require_store()?;
        RemoteCatalogScanner::new(store, &self.config).scan(compiled, cancel).await
    }
}
