//! Settings loaded from a TOML file, the environment and flags, in that
//! order of increasing precedence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use scry_search::{SearchConfig, SearchEngine};
use scry_store::{DEFAULT_PAGE_SIZE, FsStore};

/// Object store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory exposed as the bucket; no remote source without it.
    pub bucket_dir: Option<PathBuf>,

    /// Keys per listing page.
    pub page_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            bucket_dir: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchConfig,
    pub store: StoreSettings,
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Applies `SCRY_ROOT`, `SCRY_BUCKET_DIR` and `SCRY_PAGE_SIZE`.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(root) = var("SCRY_ROOT") {
            self.search.root = PathBuf::from(root);
        }
        if let Some(dir) = var("SCRY_BUCKET_DIR") {
            self.store.bucket_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = var("SCRY_PAGE_SIZE") {
            self.store.page_size = size
                .trim()
                .parse()
                .with_context(|| format!("SCRY_PAGE_SIZE is not a number: {size}"))?;
        }
        Ok(())
    }

    /// Applies flag values, which win over everything else.
    pub fn apply_flags(&mut self, root: Option<PathBuf>, bucket_dir: Option<PathBuf>) {
        if let Some(root) = root {
            self.search.root = root;
        }
        if let Some(dir) = bucket_dir {
            self.store.bucket_dir = Some(dir);
        }
    }

    /// Builds the engine, with a remote source when a bucket is configured.
    pub fn engine(&self) -> SearchEngine {
        let engine = SearchEngine::new(self.search.clone());
        match &self.store.bucket_dir {
            Some(dir) => {
                let store = FsStore::new(dir).with_page_size(self.store.page_size);
                engine.with_store(Arc::new(store))
            }
            None => engine,
        }
    }
}

/// Parses the date formats accepted on the command line, as UTC.
pub fn parse_datetime(input: &str) -> anyhow::Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(at.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("unrecognized date '{input}' (use YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scry.toml");
        std::fs::write(
            &path,
            r#"
[search]
root = "/srv/files"
content_concurrency = 8

[store]
bucket_dir = "/srv/bucket"
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.search.root, PathBuf::from("/srv/files"));
        assert_eq!(settings.search.content_concurrency, 8);
        assert_eq!(settings.store.bucket_dir, Some(PathBuf::from("/srv/bucket")));
        assert_eq!(settings.store.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_precedence() {
        let mut settings = Settings::default();
        let vars: HashMap<&str, &str> = [("SCRY_ROOT", "/env/root"), ("SCRY_PAGE_SIZE", "50")].into();
        settings
            .apply_vars(|name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(settings.search.root, PathBuf::from("/env/root"));
        assert_eq!(settings.store.page_size, 50);

        settings.apply_flags(Some(PathBuf::from("/flag/root")), None);
        assert_eq!(settings.search.root, PathBuf::from("/flag/root"));
        assert_eq!(settings.store.bucket_dir, None);
    }

    #[test]
    fn test_bad_page_size() {
        let mut settings = Settings::default();
        assert!(settings.apply_vars(|_| Some("lots".to_string())).is_err());
    }

    #[test]
    fn test_parse_datetime() {
        let expected = Utc.with_ymd_and_hms(2024, 8, 1, 13, 30, 0).unwrap();
        assert_eq!(parse_datetime("2024-08-01 13:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-08-01T13:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-08-01T13:30:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2024-08-01T15:30:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("2024-08-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_datetime("yesterday").is_err());
    }
}
