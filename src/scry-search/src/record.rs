//! Search result types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use scry_store::ObjectEntry;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The sandboxed local directory tree.
    Local,
    /// The remote object store.
    Remote,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// What a result matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// The name matched (or the query was a wildcard).
    Name,
    /// The content matched.
    Content,
}

impl MatchType {
    /// Sort rank: name matches always precede content matches.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Name => 0,
            Self::Content => 1,
        }
    }
}

/// A single file, folder or object as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Stable identifier derived from the source and full path/key.
    pub id: String,

    /// Base name.
    pub name: String,

    /// Root-relative path with a single leading `/`.
    pub path: String,

    /// Path of the containing folder, `/` at the top level.
    pub parent_path: String,

    pub kind: EntryKind,

    /// Size in bytes; `None` for folders.
    pub size: Option<u64>,

    pub modified_at: DateTime<Utc>,

    pub source: Source,

    /// Lowercased extension including the dot.
    pub extension: Option<String>,

    /// Raw store key for remote records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ObjectRecord {
    /// Builds a local record from its root-relative path (`/`-separated).
    pub fn local(
        relative_path: &str,
        kind: EntryKind,
        size: Option<u64>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        let path = rooted(relative_path);
        let name = base_name(&path).to_string();
        let extension = match kind {
            EntryKind::File => extension_of(&name),
            EntryKind::Folder => None,
        };
        Self {
            id: record_id(Source::Local, &path),
            parent_path: parent_of(&path),
            name,
            path,
            kind,
            size,
            modified_at,
            source: Source::Local,
            extension,
            key: None,
        }
    }

    /// Builds a remote record from a listing entry.
    pub fn remote(entry: &ObjectEntry) -> Self {
        let path = rooted(&entry.key);
        let name = entry.base_name().to_string();
        Self {
            id: record_id(Source::Remote, &entry.key),
            parent_path: parent_of(&path),
            extension: extension_of(&name),
            name,
            path,
            kind: EntryKind::File,
            size: Some(entry.size),
            modified_at: entry.modified_at,
            source: Source::Remote,
            key: Some(entry.key.clone()),
        }
    }
}

/// A record that matched a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub record: ObjectRecord,

    pub match_type: MatchType,

    /// Number of content matches, for content matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,

    /// Text excerpt around the first match, or the head of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl MatchResult {
    /// Creates a name match.
    pub fn name(record: ObjectRecord) -> Self {
        Self {
            record,
            match_type: MatchType::Name,
            match_count: None,
            preview: None,
        }
    }

    /// Creates a content match.
    pub fn content(record: ObjectRecord, match_count: usize, preview: String) -> Self {
        Self {
            record,
            match_type: MatchType::Content,
            match_count: Some(match_count),
            preview: Some(preview),
        }
    }

    /// Sets the preview.
    pub fn with_preview(mut self, preview: Option<String>) -> Self {
        self.preview = preview;
        self
    }
}

/// `"{source}_"` followed by the first 16 hex digits of SHA-256 over `path`.
pub fn record_id(source: Source, path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex = format!("{digest:x}");
    format!("{}_{}", source.as_str(), &hex[..16])
}

/// Prefixes exactly one `/`.
fn rooted(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => trimmed,
    }
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_string(),
        _ => "/".to_string(),
    }
}

/// Lowercased `.ext` of a file name, `None` without a dot.
pub fn extension_of(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(format!(".{}", ext.to_lowercase())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_record_paths() {
        let now = Utc::now();
        let record = ObjectRecord::remote(&ObjectEntry::new("uploads/Report.PDF", 2048, now));
        assert_eq!(record.path, "/uploads/Report.PDF");
        assert_eq!(record.parent_path, "/uploads");
        assert_eq!(record.name, "Report.PDF");
        assert_eq!(record.extension.as_deref(), Some(".pdf"));
        assert_eq!(record.key.as_deref(), Some("uploads/Report.PDF"));

        let slashed = ObjectRecord::remote(&ObjectEntry::new("/odd/key.txt", 1, now));
        assert_eq!(slashed.path, "/odd/key.txt");

        let top = ObjectRecord::remote(&ObjectEntry::new("top.txt", 1, now));
        assert_eq!(top.parent_path, "/");
    }

    #[test]
    fn test_local_record() {
        let now = Utc::now();
        let file = ObjectRecord::local("a/b.txt", EntryKind::File, Some(11), now);
        assert_eq!(file.path, "/a/b.txt");
        assert_eq!(file.parent_path, "/a");
        assert_eq!(file.extension.as_deref(), Some(".txt"));

        let folder = ObjectRecord::local("a/docs.v2", EntryKind::Folder, None, now);
        assert_eq!(folder.name, "docs.v2");
        assert_eq!(folder.extension, None);
    }

    #[test]
    fn test_record_id_is_stable_and_source_scoped() {
        let a = record_id(Source::Remote, "x/y.txt");
        assert_eq!(a, record_id(Source::Remote, "x/y.txt"));
        assert_ne!(a, record_id(Source::Remote, "x/z.txt"));
        assert!(a.starts_with("remote_"));
        assert_eq!(a.len(), "remote_".len() + 16);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.TXT").as_deref(), Some(".txt"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_match_result_serializes_flat() {
        let now = Utc::now();
        let result = MatchResult::content(
            ObjectRecord::local("a/b.txt", EntryKind::File, Some(11), now),
            1,
            "hello world".into(),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["path"], "/a/b.txt");
        assert_eq!(value["match_type"], "content");
        assert_eq!(value["source"], "local");
        assert!(value.get("key").is_none());
    }
}
