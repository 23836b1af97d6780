//! Walker over the sandboxed local tree.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use crate::content::ContentInspector;
use crate::query::CompiledQuery;
use crate::record::{EntryKind, MatchResult, ObjectRecord};
use crate::sandbox::PathSandbox;

/// What a finished local walk produced.
#[derive(Debug, Default)]
pub struct LocalScan {
    pub matches: Vec<MatchResult>,
    /// Entries visited, hidden ones that were skipped excluded.
    pub scanned: usize,
    /// Entries whose metadata or content could not be read.
    pub skipped: usize,
    /// The walk stopped early because it was cancelled.
    pub cancelled: bool,
}

/// Depth-first, directory-first walk yielding matches in visit order.
///
/// Siblings are visited directories first, then by name, so repeated walks of
/// an unchanged tree yield identical sequences. Symlinks are never followed.
/// Unreadable entries are logged and skipped; they never end the walk.
pub struct LocalTreeWalker {
    entries: walkdir::IntoIter,
    query: Arc<CompiledQuery>,
    inspector: ContentInspector,
    sandbox: PathSandbox,
    cancel: CancellationToken,
    scanned: usize,
    skipped: usize,
    cancelled: bool,
}

impl LocalTreeWalker {
    /// Walks everything below `start`, which must already be resolved inside
    /// `sandbox`.
    pub fn new(
        start: &Path,
        sandbox: PathSandbox,
        query: Arc<CompiledQuery>,
        inspector: ContentInspector,
        cancel: CancellationToken,
    ) -> Self {
        let entries = WalkDir::new(start)
            .min_depth(1)
            .follow_links(false)
            .sort_by(|a, b| {
                b.file_type()
                    .is_dir()
                    .cmp(&a.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter();

        Self {
            entries,
            query,
            inspector,
            sandbox,
            cancel,
            scanned: 0,
            skipped: 0,
            cancelled: false,
        }
    }

    /// Drains the walker.
    pub fn run(mut self) -> LocalScan {
        let matches: Vec<MatchResult> = self.by_ref().collect();
        tracing::debug!(
            "Local walk finished: {} entries, {} matches, {} skipped",
            self.scanned,
            matches.len(),
            self.skipped
        );
        LocalScan {
            matches,
            scanned: self.scanned,
            skipped: self.skipped,
            cancelled: self.cancelled,
        }
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry.file_name().to_string_lossy().starts_with('.')
    }

    fn visit(&mut self, entry: &DirEntry) -> Option<MatchResult> {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!("Skipping symlink {}", entry.path().display());
            return None;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = self.sandbox.relative(entry.path());
        let query = &self.query.query;

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}", entry.path().display(), e);
                self.skipped += 1;
                return None;
            }
        };
        let modified_at: DateTime<Utc> = metadata.modified().map(DateTime::from).unwrap_or_default();

        if file_type.is_dir() {
            let eligible = query.folders
                && (query.is_wildcard() || query.search_type.includes_name())
                && self.query.names.matches(&name);
            return eligible.then(|| {
                MatchResult::name(ObjectRecord::local(&relative, EntryKind::Folder, None, modified_at))
            });
        }

        let size = metadata.len();
        if !self.query.file_passes_filters(&name, size, modified_at) {
            return None;
        }
        let record = ObjectRecord::local(&relative, EntryKind::File, Some(size), modified_at);

        let name_hit = query.is_wildcard()
            || (query.search_type.includes_name() && self.query.names.matches(&name));
        if name_hit {
            let preview = if query.want_preview && self.inspector.is_scannable(&name, size) {
                self.head_preview(entry.path())
            } else {
                None
            };
            return Some(MatchResult::name(record).with_preview(preview));
        }

        let pattern = self.query.content.as_ref()?;
        if !self.inspector.is_scannable(&name, size) {
            return None;
        }
        match std::fs::read(entry.path()) {
            Ok(bytes) => self
                .inspector
                .scan(&bytes, pattern)
                .map(|found| MatchResult::content(record, found.count, found.preview)),
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", entry.path().display(), e);
                self.skipped += 1;
                None
            }
        }
    }

    fn head_preview(&self, path: &Path) -> Option<String> {
        let mut head = Vec::new();
        let read = File::open(path).and_then(|file| file.take(self.inspector.head_len()).read_to_end(&mut head));
        match read {
            Ok(_) => self.inspector.head_preview(&head),
            Err(e) => {
                tracing::debug!("Cannot preview {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Iterator for LocalTreeWalker {
    type Item = MatchResult;

    fn next(&mut self) -> Option<MatchResult> {
        loop {
            if self.cancel.is_cancelled() {
                self.cancelled = true;
                return None;
            }

            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    self.skipped += 1;
                    continue;
                }
            };

            if !self.query.query.include_hidden && Self::is_hidden(&entry) {
                if entry.file_type().is_dir() {
                    self.entries.skip_current_dir();
                }
                continue;
            }

            self.scanned += 1;
            if let Some(found) = self.visit(&entry) {
                return Some(found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::query::{SearchQuery, SearchType};
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/nested")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("a.txt"), "hello world").unwrap();
        std::fs::write(root.join("docs/readme.md"), "nothing here").unwrap();
        std::fs::write(root.join("docs/nested/deep.txt"), "say hello").unwrap();
        std::fs::write(root.join(".git/config"), "hello").unwrap();
        std::fs::write(root.join(".env"), "hello").unwrap();
        dir
    }

    fn walk(dir: &TempDir, query: SearchQuery) -> LocalScan {
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        let compiled = Arc::new(query.compile().unwrap());
        let inspector = ContentInspector::new(&SearchConfig::default());
        LocalTreeWalker::new(
            sandbox.root(),
            sandbox.clone(),
            compiled,
            inspector,
            CancellationToken::new(),
        )
        .run()
    }

    fn paths(scan: &LocalScan) -> Vec<&str> {
        scan.matches.iter().map(|m| m.record.path.as_str()).collect()
    }

    #[test]
    fn test_wildcard_walk_is_dirs_first_preorder() {
        let dir = tree();
        let scan = walk(&dir, SearchQuery::new("*"));
        assert_eq!(
            paths(&scan),
            vec![
                "/docs",
                "/docs/nested",
                "/docs/nested/deep.txt",
                "/docs/readme.md",
                "/a.txt"
            ]
        );
        assert_eq!(scan.scanned, 5);
        assert!(!scan.cancelled);
    }

    #[test]
    fn test_hidden_entries_are_opt_in() {
        let dir = tree();
        let scan = walk(&dir, SearchQuery::new("*").include_hidden(true));
        let found = paths(&scan);
        assert!(found.contains(&"/.git/config"));
        assert!(found.contains(&"/.env"));
    }

    #[test]
    fn test_content_walk() {
        let dir = tree();
        let scan = walk(&dir, SearchQuery::new("hello").search_type(SearchType::Content));
        assert_eq!(paths(&scan), vec!["/docs/nested/deep.txt", "/a.txt"]);
        assert!(scan.matches.iter().all(|m| m.match_count == Some(1)));
    }

    #[test]
    fn test_both_prefers_name_match() {
        let dir = tree();
        std::fs::write(dir.path().join("hello.txt"), "hello hello").unwrap();
        let scan = walk(&dir, SearchQuery::new("hello").search_type(SearchType::Both));
        let hello = scan
            .matches
            .iter()
            .find(|m| m.record.name == "hello.txt")
            .unwrap();
        assert_eq!(hello.match_type, crate::record::MatchType::Name);
        assert_eq!(hello.match_count, None);
    }

    #[test]
    fn test_folders_can_be_excluded() {
        let dir = tree();
        let scan = walk(&dir, SearchQuery::new("*").folders(false));
        assert!(scan.matches.iter().all(|m| m.record.kind == EntryKind::File));
    }

    #[test]
    fn test_cancelled_walk_stops() {
        let dir = tree();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scan = LocalTreeWalker::new(
            sandbox.root(),
            sandbox.clone(),
            Arc::new(SearchQuery::new("*").compile().unwrap()),
            ContentInspector::new(&SearchConfig::default()),
            cancel,
        )
        .run();
        assert!(scan.cancelled);
        assert!(scan.matches.is_empty());
    }
}
