//! Content scanning: which objects are scannable, how their bytes are decoded,
//! and how matches are counted and previewed.

use std::borrow::Cow;

use regex::Regex;

use crate::config::SearchConfig;
use crate::error::SearchResult;
use crate::matcher::compile_regex;
use crate::query::SearchQuery;
use crate::record::extension_of;

const ELLIPSIS: &str = "...";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encodings tried, in order, when decoding content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8 without a byte order mark.
    Utf8,
    /// UTF-8 with a leading byte order mark, which is stripped.
    Utf8Bom,
    /// ISO-8859-1 graphic characters; C1 control bytes are rejected.
    Latin1,
    /// Windows-1252.
    Windows1252,
}

/// The fallback chain; the first charset that decodes wins.
pub const DECODE_CHAIN: [Charset; 4] = [
    Charset::Utf8,
    Charset::Utf8Bom,
    Charset::Latin1,
    Charset::Windows1252,
];

impl Charset {
    /// Decodes `bytes` strictly, returning `None` on any invalid sequence.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            Self::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
            }
            Self::Utf8Bom => bytes
                .strip_prefix(UTF8_BOM)
                .and_then(|rest| std::str::from_utf8(rest).ok())
                .map(Cow::Borrowed),
            Self::Latin1 => {
                if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
                    return None;
                }
                Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
            }
            Self::Windows1252 => {
                encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

/// Decodes with the first charset of [`DECODE_CHAIN`] that accepts the bytes.
pub fn decode_text(bytes: &[u8]) -> Option<(Cow<'_, str>, Charset)> {
    DECODE_CHAIN
        .iter()
        .find_map(|charset| charset.decode(bytes).map(|text| (text, *charset)))
}

/// The pattern searched for inside content.
#[derive(Debug, Clone)]
pub enum ContentPattern {
    Regex(Regex),
    Literal { needle: String, case_sensitive: bool },
}

impl ContentPattern {
    /// Compiles the content pattern for `query`. Glob characters are taken
    /// literally here.
    pub fn compile(query: &SearchQuery) -> SearchResult<Self> {
        if query.use_regex {
            return Ok(Self::Regex(compile_regex(&query.text, query.case_sensitive)?));
        }
        let needle = if query.case_sensitive {
            query.text.clone()
        } else {
            query.text.to_lowercase()
        };
        Ok(Self::Literal {
            needle,
            case_sensitive: query.case_sensitive,
        })
    }

    /// Counts non-overlapping matches and returns the byte span of the first
    /// one within `text`.
    fn find(&self, text: &str) -> Option<(usize, std::ops::Range<usize>)> {
        match self {
            Self::Regex(regex) => {
                let mut found = regex.find_iter(text);
                let first = found.next()?;
                Some((1 + found.count(), first.range()))
            }
            Self::Literal {
                needle,
                case_sensitive: true,
            } => {
                let start = text.find(needle.as_str())?;
                Some((text.matches(needle.as_str()).count(), start..start + needle.len()))
            }
            Self::Literal { needle, .. } => {
                let folded = text.to_lowercase();
                let start = folded.find(needle.as_str())?;
                let count = folded.matches(needle.as_str()).count();
                let span = original_offset(text, start)..original_offset(text, start + needle.len());
                Some((count, span))
            }
        }
    }
}

/// Maps a byte offset in `text.to_lowercase()` back onto `text`.
fn original_offset(text: &str, folded_offset: usize) -> usize {
    let mut folded = 0;
    for (idx, ch) in text.char_indices() {
        if folded >= folded_offset {
            return idx;
        }
        folded += ch.to_lowercase().map(char::len_utf8).sum::<usize>();
    }
    text.len()
}

/// Match count and preview for one scanned object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    pub count: usize,
    pub preview: String,
    pub charset: Charset,
}

/// Decides what gets content-scanned and performs the scan.
#[derive(Debug, Clone)]
pub struct ContentInspector {
    ceiling: u64,
    text_extensions: Vec<String>,
    context_chars: usize,
    head_chars: usize,
}

impl ContentInspector {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            ceiling: config.content_scan_ceiling,
            text_extensions: config
                .text_extensions
                .iter()
                .map(|e| format!(".{}", e.trim_start_matches('.').to_lowercase()))
                .collect(),
            context_chars: config.preview_context_chars,
            head_chars: config.head_preview_chars,
        }
    }

    /// Largest size fetched for scanning.
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Bytes fetched for a head preview.
    pub fn head_len(&self) -> u64 {
        (self.head_chars as u64).saturating_mul(2).max(1)
    }

    /// True iff `size` is within the ceiling and the name looks like text,
    /// either by extension or by guessed MIME type.
    pub fn is_scannable(&self, name: &str, size: u64) -> bool {
        if size > self.ceiling {
            return false;
        }
        if extension_of(name).is_some_and(|ext| self.text_extensions.contains(&ext)) {
            return true;
        }
        mime_guess::from_path(name)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::TEXT)
    }

    /// Scans decoded `bytes` for `pattern`. `None` when nothing matched or no
    /// charset could decode the bytes.
    pub fn scan(&self, bytes: &[u8], pattern: &ContentPattern) -> Option<ContentMatch> {
        let Some((text, charset)) = decode_text(bytes) else {
            tracing::debug!("No charset could decode {} bytes, skipping", bytes.len());
            return None;
        };
        let (count, span) = pattern.find(&text)?;
        Some(ContentMatch {
            count,
            preview: self.excerpt(&text, span),
            charset,
        })
    }

    /// Preview of the start of an object, for name matches.
    pub fn head_preview(&self, bytes: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(bytes);
        let mut chars = text.chars();
        let head: String = chars.by_ref().take(self.head_chars).collect();
        let mut preview = collapse_whitespace(&head);
        if preview.is_empty() {
            return None;
        }
        if chars.next().is_some() {
            preview.push_str(ELLIPSIS);
        }
        Some(preview)
    }

    /// Context window around `span`, whitespace collapsed, ellipses on
    /// clipped sides.
    fn excerpt(&self, text: &str, span: std::ops::Range<usize>) -> String {
        let start = if self.context_chars == 0 {
            span.start
        } else {
            text[..span.start]
                .char_indices()
                .rev()
                .nth(self.context_chars - 1)
                .map_or(0, |(idx, _)| idx)
        };
        let end = text[span.end..]
            .char_indices()
            .nth(self.context_chars)
            .map_or(text.len(), |(idx, _)| span.end + idx);

        let mut preview = collapse_whitespace(&text[start..end]);
        if start > 0 {
            preview.insert_str(0, ELLIPSIS);
        }
        if end < text.len() {
            preview.push_str(ELLIPSIS);
        }
        preview
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
