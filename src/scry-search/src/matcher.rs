//! Name matching shared by the local walker and the catalog scanner.

use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};

use crate::error::{SearchError, SearchResult};
use crate::query::SearchQuery;

/// How a candidate name is compared against the query text.
#[derive(Debug, Clone)]
enum Mode {
    /// `*` or blank text.
    Everything,
    /// Regular expression search anywhere in the name.
    Regex(Regex),
    /// Whole-name glob with `*`, `?`, `[...]` and `[!...]`.
    Glob(Pattern),
    /// Substring containment.
    Substring(String),
}

/// Compiled name matcher for one query.
///
/// Interpretation order: wildcard, regex, glob (text contains `*` or `?`),
/// then substring. Case folding applies uniformly when the query is not
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct Matcher {
    mode: Mode,
    case_sensitive: bool,
}

impl Matcher {
    /// Compiles the name matcher for `query`.
    pub fn compile(query: &SearchQuery) -> SearchResult<Self> {
        let case_sensitive = query.case_sensitive;
        let fold = |text: &str| {
            if case_sensitive {
                text.to_string()
            } else {
                text.to_lowercase()
            }
        };

        let mode = if query.is_wildcard() {
            Mode::Everything
        } else if query.use_regex {
            Mode::Regex(compile_regex(&query.text, case_sensitive)?)
        } else if query.text.contains(['*', '?']) {
            Mode::Glob(compile_glob(&fold(&query.text))?)
        } else {
            Mode::Substring(fold(&query.text))
        };

        Ok(Self {
            mode,
            case_sensitive,
        })
    }

    /// Checks a candidate name.
    pub fn matches(&self, name: &str) -> bool {
        match &self.mode {
            Mode::Everything => true,
            Mode::Regex(regex) => regex.is_match(name),
            Mode::Glob(pattern) => pattern.matches_with(
                &self.fold(name),
                MatchOptions {
                    case_sensitive: self.case_sensitive,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            Mode::Substring(needle) => self.fold(name).contains(needle.as_str()),
        }
    }

    fn fold(&self, text: &str) -> String {
        if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

/// Compiles `pattern`, case-insensitive unless `case_sensitive`.
pub(crate) fn compile_regex(pattern: &str, case_sensitive: bool) -> SearchResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| SearchError::invalid_pattern(pattern, e.to_string()))
}

/// Compiles a whole-name glob. Runs of `*` collapse to one since names
/// never contain separators.
fn compile_glob(text: &str) -> SearchResult<Pattern> {
    let mut collapsed = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    Pattern::new(&collapsed).map_err(|e| SearchError::invalid_pattern(text, e.to_string()))
}
