//! Download, rename and delete of remote objects by approximate key, and
//! upload into a folder.

use std::sync::Arc;

use bytes::Bytes;
use scry_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::resolver::{KeyResolver, ResolutionCandidate, ResolutionReason};

/// Characters never allowed in a new object name.
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest new object name, in UTF-8 bytes.
const MAX_NAME_BYTES: usize = 255;

/// Suggestions listed when a guess needs confirmation.
const MAX_SUGGESTIONS: usize = 5;

/// Which resolved key an action may act on when the requested key misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Only act on a spelling variant of the requested key; anything looser
    /// is returned as suggestions.
    #[default]
    ExactOnly,
    /// Act on the best candidate, whatever its reason.
    FirstCandidate,
}

/// A downloaded object.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub key: String,
    pub bytes: Bytes,
    pub resolution: ResolutionReason,
}

/// Keys involved in a completed rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub from: String,
    pub to: String,
}

/// Store actions that locate their object through the [`KeyResolver`].
#[derive(Debug, Clone)]
pub struct ObjectActions {
    store: Arc<dyn ObjectStore>,
    resolver: KeyResolver,
}

impl ObjectActions {
    pub fn new(store: Arc<dyn ObjectStore>, config: &SearchConfig) -> Self {
        Self {
            resolver: KeyResolver::new(store.clone(), config),
            store,
        }
    }

    /// Downloads the object `requested` refers to.
    pub async fn fetch(&self, requested: &str, policy: ResolvePolicy) -> SearchResult<FetchedObject> {
        let target = self.locate(requested, policy).await?;
        let bytes = self
            .store
            .get_object(&target.key, None)
            .await
            .map_err(|e| SearchError::unreadable(&target.key, e.to_string()))?;
        Ok(FetchedObject {
            key: target.key,
            bytes,
            resolution: target.reason,
        })
    }

    /// Renames the object in place: the folder part of its key is kept and
    /// only the last segment becomes `new_name`.
    pub async fn rename(
        &self,
        requested: &str,
        new_name: &str,
        policy: ResolvePolicy,
    ) -> SearchResult<RenameOutcome> {
        let new_name = validate_new_name(new_name)?;
        let source = self.locate(requested, policy).await?;
        let destination = match source.key.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/{new_name}"),
            None => new_name.to_string(),
        };

        if self.store.head_exists(&destination).await? {
            return Err(SearchError::AlreadyExists(destination));
        }

        self.store.copy_object(&source.key, &destination).await?;
        if let Err(e) = self.store.delete_object(&source.key).await {
            tracing::warn!(
                "Copied '{}' to '{}' but could not delete the original: {}",
                source.key,
                destination,
                e
            );
            return Err(e.into());
        }

        tracing::info!("Renamed '{}' to '{}'", source.key, destination);
        Ok(RenameOutcome {
            from: source.key,
            to: destination,
        })
    }

    /// Deletes the object `requested` refers to, returning its key.
    pub async fn delete(&self, requested: &str, policy: ResolvePolicy) -> SearchResult<String> {
        let target = self.locate(requested, policy).await?;
        self.store.delete_object(&target.key).await?;
        tracing::info!("Deleted '{}'", target.key);
        Ok(target.key)
    }

    /// Stores `bytes` as `name` inside `folder` and returns the new key.
    /// An existing object is only replaced when `overwrite` is set.
    pub async fn upload(&self, folder: &str, name: &str, bytes: Bytes, overwrite: bool) -> SearchResult<String> {
        let name = validate_new_name(name)?;
        let mut segments = Vec::new();
        for segment in folder.split('/').filter(|s| !s.trim().is_empty()) {
            segments.push(validate_new_name(segment)?);
        }
        segments.push(name);
        let key = segments.join("/");

        if !overwrite && self.store.head_exists(&key).await? {
            return Err(SearchError::AlreadyExists(key));
        }

        let size = bytes.len();
        self.store.put_object(&key, bytes).await?;
        tracing::info!("Uploaded '{}' ({} bytes)", key, size);
        Ok(key)
    }

    /// Finds the key to act on: the requested key itself when it exists,
    /// otherwise a resolved candidate allowed by `policy`.
    async fn locate(&self, requested: &str, policy: ResolvePolicy) -> SearchResult<ResolutionCandidate> {
        let verbatim = requested.trim_start_matches('/');
        if !verbatim.is_empty() && self.store.head_exists(verbatim).await? {
            return Ok(ResolutionCandidate {
                key: verbatim.to_string(),
                reason: ResolutionReason::ExactVariant,
            });
        }

        let candidates = self.resolver.resolve(requested).await;
        let chosen = match policy {
            ResolvePolicy::ExactOnly => candidates.iter().find(|c| c.reason.is_exact()),
            ResolvePolicy::FirstCandidate => candidates.first(),
        };
        if let Some(chosen) = chosen {
            tracing::debug!("'{}' resolved to '{}' ({:?})", requested, chosen.key, chosen.reason);
            return Ok(chosen.clone());
        }
        if candidates.is_empty() {
            return Err(SearchError::NotFound(requested.to_string()));
        }
        Err(SearchError::Unconfirmed {
            requested: requested.to_string(),
            suggestions: candidates
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .map(|c| c.key)
                .collect(),
        })
    }
}

/// Checks a new object name and returns it trimmed.
pub fn validate_new_name(name: &str) -> SearchResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SearchError::invalid_name(name, "name is empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(SearchError::invalid_name(name, "name is a directory reference"));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(SearchError::invalid_name(name, format!("contains '{c}'")));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(SearchError::invalid_name(name, "contains control characters"));
    }
    if trimmed.len() > MAX_NAME_BYTES {
        return Err(SearchError::invalid_name(
            name,
            format!("longer than {MAX_NAME_BYTES} bytes"),
        ));
    }
    Ok(trimmed)
}
