//! Resolution of approximate keys to keys that actually exist in the store.
//!
//! Three tiers run in order and all of them contribute candidates:
//!
//! 1. spelling variants of the key itself, checked for existence
//! 2. the bare file name under common upload folders and name prefixes
//! 3. a bounded catalog scan classifying every key against the target name
//!
//! Tier 1 and 2 candidates keep their probing order; tier 3 candidates are
//! ranked by how closely they match. A key is never listed twice.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use scry_store::{ObjectStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;

/// Why a key was offered as a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    /// A spelling variant of the requested key exists.
    ExactVariant,
    /// The file name exists under a well-known folder or name prefix.
    CommonPrefixGuess,
    /// Case-folded file names are equal.
    ExactFilename,
    /// File names are equal once extensions are dropped.
    BaseName,
    /// One file name contains the other (or the target's stem).
    SubstringEither,
    /// The full key contains the requested path.
    PathSubstring,
}

impl ResolutionReason {
    /// Lower is closer.
    pub fn rank(&self) -> u8 {
        match self {
            Self::ExactVariant => 0,
            Self::CommonPrefixGuess => 1,
            Self::ExactFilename => 2,
            Self::BaseName => 3,
            Self::SubstringEither => 4,
            Self::PathSubstring => 5,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::ExactVariant)
    }
}

/// One resolved key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub key: String,
    pub reason: ResolutionReason,
}

/// Ordered, duplicate-free candidate list under construction.
#[derive(Debug, Default)]
struct Candidates {
    seen: HashSet<String>,
    list: Vec<ResolutionCandidate>,
}

impl Candidates {
    fn push(&mut self, key: String, reason: ResolutionReason) {
        if self.seen.insert(key.clone()) {
            self.list.push(ResolutionCandidate { key, reason });
        }
    }
}

/// Names derived from the requested key, all case-folded.
struct Target {
    name: String,
    stem: String,
    path: String,
}

impl Target {
    fn new(requested: &str) -> Self {
        let path = requested.trim().trim_start_matches('/').to_lowercase();
        let name = base_name(&path).to_string();
        let stem = stem_of(&name).to_string();
        Self { name, stem, path }
    }

    /// Closest reason `key` matches this target, if any.
    fn classify(&self, key: &str) -> Option<ResolutionReason> {
        let folded = key.to_lowercase();
        let name = base_name(&folded);
        let stem = stem_of(name);

        if !self.name.is_empty() && name == self.name {
            return Some(ResolutionReason::ExactFilename);
        }
        if !self.stem.is_empty() && stem == self.stem {
            return Some(ResolutionReason::BaseName);
        }
        let contains_target = !self.name.is_empty()
            && (name.contains(self.name.as_str())
                || (!self.stem.is_empty() && name.contains(self.stem.as_str())));
        let within_target = !name.is_empty() && self.name.contains(name);
        if contains_target || within_target {
            return Some(ResolutionReason::SubstringEither);
        }
        if !self.path.is_empty() && folded.contains(self.path.as_str()) {
            return Some(ResolutionReason::PathSubstring);
        }
        None
    }
}

/// Why a tier stopped before finishing.
enum Halt {
    Cancelled,
    Failed(StoreError),
}

/// Turns an approximate key into existing keys.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    store: Arc<dyn ObjectStore>,
    prefixes: Vec<String>,
    name_prefixes: Vec<String>,
    scan_cap: usize,
}

impl KeyResolver {
    pub fn new(store: Arc<dyn ObjectStore>, config: &SearchConfig) -> Self {
        Self {
            store,
            prefixes: config.resolver_prefixes.clone(),
            name_prefixes: config.resolver_name_prefixes.clone(),
            scan_cap: config.resolver_scan_cap,
        }
    }

    /// Returns candidates for `requested`, best first. Empty when nothing
    /// plausible exists. Store failures end the chain early with what was
    /// found so far.
    pub async fn resolve(&self, requested: &str) -> Vec<ResolutionCandidate> {
        self.resolve_with_cancel(requested, &CancellationToken::new()).await
    }

    /// Like [`resolve`](Self::resolve), returning the candidates gathered so
    /// far once `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        requested: &str,
        cancel: &CancellationToken,
    ) -> Vec<ResolutionCandidate> {
        let mut candidates = Candidates::default();

        let tiers = [
            (exact_variants(requested), ResolutionReason::ExactVariant),
            (self.prefix_guesses(requested), ResolutionReason::CommonPrefixGuess),
        ];
        for (keys, reason) in tiers {
            match self.check_existing(keys, reason, &mut candidates, cancel).await {
                Ok(()) => {}
                Err(Halt::Cancelled) => {
                    tracing::debug!("Key resolution for '{}' cancelled", requested);
                    return candidates.list;
                }
                Err(Halt::Failed(e)) => {
                    tracing::warn!("Key resolution for '{}' stopped early: {}", requested, e);
                    return candidates.list;
                }
            }
        }

        let mut found = Vec::new();
        match self.catalog_matches(requested, &mut found, cancel).await {
            Ok(()) => {}
            Err(Halt::Cancelled) => tracing::debug!("Catalog scan for '{}' cancelled", requested),
            Err(Halt::Failed(e)) => tracing::warn!("Catalog scan for '{}' failed: {}", requested, e),
        }
        found.sort_by_key(|c| c.reason.rank());
        for candidate in found {
            candidates.push(candidate.key, candidate.reason);
        }

        tracing::debug!("Resolved '{}' to {} candidates", requested, candidates.list.len());
        candidates.list
    }

    /// Checks `keys` concurrently, keeping their order. Only fatal errors
    /// stop the chain; other failed checks count as misses.
    async fn check_existing(
        &self,
        keys: Vec<String>,
        reason: ResolutionReason,
        candidates: &mut Candidates,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        let checks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Halt::Cancelled),
            checks = join_all(keys.iter().map(|key| self.store.head_exists(key))) => checks,
        };
        for (key, exists) in keys.into_iter().zip(checks) {
            match exists {
                Ok(true) => candidates.push(key, reason),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(Halt::Failed(e)),
                Err(e) => tracing::debug!("Existence check of '{}' failed: {}", key, e),
            }
        }
        Ok(())
    }

    /// The bare file name under each folder prefix, on its own, then behind
    /// each name prefix.
    fn prefix_guesses(&self, requested: &str) -> Vec<String> {
        let trimmed = requested.trim().trim_matches('/');
        let name = base_name(trimmed);
        if name.is_empty() {
            return Vec::new();
        }
        let mut guesses: Vec<String> = self.prefixes.iter().map(|p| format!("{p}{name}")).collect();
        guesses.push(name.to_string());
        guesses.extend(self.name_prefixes.iter().map(|p| format!("{p}{name}")));
        guesses
    }

    /// Lists up to the scan cap and classifies each key into `found`, in
    /// listing order.
    async fn catalog_matches(
        &self,
        requested: &str,
        found: &mut Vec<ResolutionCandidate>,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        let target = Target::new(requested);
        let mut examined = 0;
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                page = self.store.list_page(None, cursor.as_deref()) => page.map_err(Halt::Failed)?,
            };
            for entry in &page.entries {
                if examined >= self.scan_cap {
                    break 'pages;
                }
                examined += 1;
                if entry.is_directory_marker() {
                    continue;
                }
                if let Some(reason) = target.classify(&entry.key) {
                    found.push(ResolutionCandidate {
                        key: entry.key.clone(),
                        reason,
                    });
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if examined >= self.scan_cap {
            tracing::debug!("Catalog scan capped at {} keys", self.scan_cap);
        }
        Ok(())
    }
}

/// The key as given, without leading or trailing slashes, with doubled
/// slashes collapsed, trimmed, fully normalized, and finally URL-decoded.
/// Order kept, blanks and duplicates dropped.
fn exact_variants(requested: &str) -> Vec<String> {
    let trimmed = requested.trim();
    let normalized = collapse_slashes(trimmed.trim_matches('/'));
    let mut variants = vec![
        requested.to_string(),
        requested.trim_start_matches('/').to_string(),
        requested.trim_end_matches('/').to_string(),
        collapse_slashes(requested),
        trimmed.to_string(),
        normalized.clone(),
    ];
    if let Ok(decoded) = urlencoding::decode(&normalized) {
        if decoded != normalized {
            variants.push(decoded.into_owned());
        }
    }

    let mut seen = HashSet::new();
    variants.retain(|v| !v.trim().is_empty() && seen.insert(v.clone()));
    variants
}

fn collapse_slashes(key: &str) -> String {
    let mut collapsed = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}
