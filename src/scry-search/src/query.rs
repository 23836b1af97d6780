//! Search query types.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentPattern;
use crate::error::SearchResult;
use crate::matcher::Matcher;
use crate::record::{Source, extension_of};

/// What a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Match names only.
    #[default]
    Name,
    /// Match content only.
    Content,
    /// Match names, falling back to content.
    Both,
}

impl SearchType {
    pub fn includes_name(&self) -> bool {
        matches!(self, Self::Name | Self::Both)
    }

    pub fn includes_content(&self) -> bool {
        matches!(self, Self::Content | Self::Both)
    }
}

/// Inclusive size bounds in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn contains(&self, size: u64) -> bool {
        self.min.is_none_or(|min| size >= min) && self.max.is_none_or(|max| size <= max)
    }
}

/// Inclusive modification time bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl ModifiedRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after.is_none_or(|after| at >= after) && self.before.is_none_or(|before| at <= before)
    }
}

/// A search request.
///
/// Built with [`SearchQuery::new`] and the chained setters:
///
/// ```
/// use scry_search::{SearchQuery, SearchType, Source};
///
/// let query = SearchQuery::new("invoice")
///     .search_type(SearchType::Both)
///     .sources([Source::Remote])
///     .extensions(["pdf", ".TXT"]);
/// assert!(query.extension_allowed("scan.pdf"));
/// assert!(!query.extension_allowed("scan.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    /// Search text; `*` or blank matches everything.
    pub text: String,

    pub search_type: SearchType,

    /// Selected sources; empty selects all of them.
    pub sources: BTreeSet<Source>,

    pub case_sensitive: bool,

    /// Treat `text` as a regular expression.
    pub use_regex: bool,

    /// Emit matching local folders.
    pub folders: bool,

    /// Descend into and match hidden (dot-prefixed) local entries.
    pub include_hidden: bool,

    /// Normalized extension filter (lowercase, leading dot); files only.
    pub extensions: Option<BTreeSet<String>>,

    pub size_range: Option<SizeRange>,

    pub modified_range: Option<ModifiedRange>,

    /// Attach a head preview to name matches.
    pub want_preview: bool,

    /// Local sub-path below the sandbox root to search.
    pub search_path: String,

    /// Truncate the merged, sorted results to this many entries.
    pub max_results: Option<usize>,

    /// Cancel the search after this long and return partial results.
    #[serde(skip)]
    pub deadline: Option<Duration>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: "*".to_string(),
            search_type: SearchType::Name,
            sources: BTreeSet::new(),
            case_sensitive: false,
            use_regex: false,
            folders: true,
            include_hidden: false,
            extensions: None,
            size_range: None,
            modified_range: None,
            want_preview: false,
            search_path: "/".to_string(),
            max_results: None,
            deadline: None,
        }
    }
}

impl SearchQuery {
    /// Creates a name query over every source.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.sources = sources.into_iter().collect();
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn regex(mut self, use_regex: bool) -> Self {
        self.use_regex = use_regex;
        self
    }

    pub fn folders(mut self, folders: bool) -> Self {
        self.folders = folders;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Restricts files to these extensions; a leading dot is optional.
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let normalized: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .collect();
        self.extensions = (!normalized.is_empty()).then_some(normalized);
        self
    }

    pub fn size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.size_range = Some(SizeRange { min, max });
        self
    }

    pub fn modified_range(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.modified_range = Some(ModifiedRange { after, before });
        self
    }

    pub fn want_preview(mut self, want: bool) -> Self {
        self.want_preview = want;
        self
    }

    pub fn search_path(mut self, path: impl Into<String>) -> Self {
        self.search_path = path.into();
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// `*` or blank text matches everything.
    pub fn is_wildcard(&self) -> bool {
        let text = self.text.trim();
        text.is_empty() || text == "*"
    }

    /// Whether `source` takes part in this query.
    pub fn selects(&self, source: Source) -> bool {
        self.sources.is_empty() || self.sources.contains(&source)
    }

    pub fn extension_allowed(&self, name: &str) -> bool {
        match &self.extensions {
            Some(allowed) => extension_of(name).is_some_and(|ext| allowed.contains(&ext)),
            None => true,
        }
    }

    pub fn size_allowed(&self, size: u64) -> bool {
        self.size_range.is_none_or(|range| range.contains(size))
    }

    pub fn modified_allowed(&self, at: DateTime<Utc>) -> bool {
        self.modified_range.is_none_or(|range| range.contains(at))
    }

    /// Validates and compiles the query's patterns before any scanning.
    pub fn compile(&self) -> SearchResult<CompiledQuery> {
        let names = Matcher::compile(self)?;
        let content = if self.search_type.includes_content() && !self.is_wildcard() {
            Some(ContentPattern::compile(self)?)
        } else {
            None
        };
        Ok(CompiledQuery {
            query: self.clone(),
            names,
            content,
        })
    }
}

/// A query together with its compiled name and content patterns.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub query: SearchQuery,
    pub names: Matcher,
    pub content: Option<ContentPattern>,
}

impl CompiledQuery {
    /// File filters shared by both sources: extension, size and date.
    pub fn file_passes_filters(&self, name: &str, size: u64, modified_at: DateTime<Utc>) -> bool {
        self.query.extension_allowed(name)
            && self.query.size_allowed(size)
            && self.query.modified_allowed(modified_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wildcard_detection() {
        assert!(SearchQuery::new("*").is_wildcard());
        assert!(SearchQuery::new("   ").is_wildcard());
        assert!(SearchQuery::new("").is_wildcard());
        assert!(!SearchQuery::new("*.txt").is_wildcard());
    }

    #[test]
    fn test_extension_normalization() {
        let query = SearchQuery::new("x").extensions(["PDF", ".txt", " "]);
        let exts: Vec<_> = query.extensions.clone().unwrap().into_iter().collect();
        assert_eq!(exts, vec![".pdf".to_string(), ".txt".to_string()]);
        assert!(query.extension_allowed("A.PDF"));
        assert!(!query.extension_allowed("README"));

        let none = SearchQuery::new("x").extensions(Vec::<String>::new());
        assert!(none.extensions.is_none());
    }

    #[test]
    fn test_ranges_are_inclusive() {
        let query = SearchQuery::new("x").size_range(Some(10), Some(20));
        assert!(query.size_allowed(10));
        assert!(query.size_allowed(20));
        assert!(!query.size_allowed(21));

        let day = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let query = SearchQuery::new("x").modified_range(Some(day), None);
        assert!(query.modified_allowed(day));
        assert!(!query.modified_allowed(day - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_source_selection() {
        let all = SearchQuery::new("x");
        assert!(all.selects(Source::Local) && all.selects(Source::Remote));

        let remote = SearchQuery::new("x").sources([Source::Remote]);
        assert!(!remote.selects(Source::Local));
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let err = SearchQuery::new("(unclosed").regex(true).compile().unwrap_err();
        assert!(matches!(err, crate::SearchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_wildcard_compiles_without_content_pattern() {
        let compiled = SearchQuery::new("*")
            .search_type(SearchType::Content)
            .compile()
            .unwrap();
        assert!(compiled.content.is_none());
    }
}
