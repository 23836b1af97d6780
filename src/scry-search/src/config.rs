//! Configuration types for the search engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest object, in bytes, whose content is ever fetched for scanning.
pub const CONTENT_SCAN_CEILING: u64 = 10 * 1024 * 1024;

/// Extensions treated as text regardless of their guessed MIME type.
pub const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".c", ".cpp", ".h", ".hpp",
    ".cs", ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".scala", ".r", ".m", ".sql", ".sh",
    ".bash", ".ps1", ".xml", ".json", ".yaml", ".yml", ".toml", ".ini", ".cfg", ".conf", ".log",
    ".csv", ".html", ".htm", ".css", ".scss", ".sass", ".less",
];

/// Folder prefixes tried in front of a bare file name when a key misses.
pub const RESOLVER_PREFIXES: &[&str] = &[
    "uploads/", "images/", "files/", "media/", "public/", "tmp/", "data/", "assets/",
];

/// Name prefixes that upload tools commonly stamp onto file names.
pub const RESOLVER_NAME_PREFIXES: &[&str] = &["upload_", "file_", "img_"];

/// Configuration for the search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Sandbox root for local search.
    pub root: PathBuf,

    /// Objects larger than this are never fetched for content scanning.
    pub content_scan_ceiling: u64,

    /// Extensions (with leading dot, lowercase) considered text.
    pub text_extensions: Vec<String>,

    /// Maximum concurrent object fetches while content-scanning a page.
    pub content_concurrency: usize,

    /// Log scan progress every this many objects.
    pub progress_interval: usize,

    /// Characters of context kept on each side of a content match.
    pub preview_context_chars: usize,

    /// Characters kept for previews of name matches.
    pub head_preview_chars: usize,

    /// Keys considered by the resolver's full catalog scan.
    pub resolver_scan_cap: usize,

    /// Folder prefixes tried by the resolver.
    pub resolver_prefixes: Vec<String>,

    /// Name prefixes tried by the resolver.
    pub resolver_name_prefixes: Vec<String>,

    /// Retries of a failed listing page before the scan gives up on it.
    pub page_retries: u32,

    /// Whether a missing local search path is created instead of failing.
    pub create_missing_search_path: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp/filemanager"),
            content_scan_ceiling: CONTENT_SCAN_CEILING,
            text_extensions: TEXT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            content_concurrency: 4,
            progress_interval: 1000,
            preview_context_chars: 50,
            head_preview_chars: 200,
            resolver_scan_cap: 1000,
            resolver_prefixes: RESOLVER_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            resolver_name_prefixes: RESOLVER_NAME_PREFIXES
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            page_retries: 2,
            create_missing_search_path: true,
        }
    }
}

impl SearchConfig {
    /// Creates a new configuration with the specified sandbox root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Creates a builder for constructing a configuration.
    pub fn builder(root: impl Into<PathBuf>) -> SearchConfigBuilder {
        SearchConfigBuilder::new(root)
    }
}

/// Builder for creating `SearchConfig` instances.
#[derive(Debug)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Creates a new builder with the specified sandbox root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            config: SearchConfig::new(root),
        }
    }

    /// Sets the content-scan ceiling in bytes.
    pub fn content_scan_ceiling(mut self, bytes: u64) -> Self {
        self.config.content_scan_ceiling = bytes;
        self
    }

    /// Replaces the text extension list.
    pub fn text_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.text_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of concurrent content fetches.
    pub fn content_concurrency(mut self, workers: usize) -> Self {
        self.config.content_concurrency = workers.max(1);
        self
    }

    /// Sets the progress logging interval.
    pub fn progress_interval(mut self, objects: usize) -> Self {
        self.config.progress_interval = objects.max(1);
        self
    }

    /// Sets the resolver's catalog scan cap.
    pub fn resolver_scan_cap(mut self, keys: usize) -> Self {
        self.config.resolver_scan_cap = keys;
        self
    }

    /// Replaces the resolver's folder prefixes.
    pub fn resolver_prefixes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.resolver_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how often a failed listing page is retried.
    pub fn page_retries(mut self, retries: u32) -> Self {
        self.config.page_retries = retries;
        self
    }

    /// Sets whether missing search paths are created.
    pub fn create_missing_search_path(mut self, create: bool) -> Self {
        self.config.create_missing_search_path = create;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SearchConfig {
        self.config
    }
}
