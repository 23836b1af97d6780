//! Value types exchanged with a store.

use chrono::{DateTime, Utc};

/// One key as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// The raw store key.
    pub key: String,

    /// Object size in bytes.
    pub size: u64,

    /// Last modification time reported by the store.
    pub modified_at: DateTime<Utc>,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            size,
            modified_at,
        }
    }

    /// Zero-byte keys with a trailing separator only mark a "folder".
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/') && self.size == 0
    }

    /// Last path segment of the key, or the whole key when it has none.
    pub fn base_name(&self) -> &str {
        match self.key.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => &self.key,
        }
    }
}

/// A single page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Entries in store order.
    pub entries: Vec<ObjectEntry>,

    /// Opaque cursor for the next page, `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
}

impl ListPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Inclusive byte range for partial reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering `0..=end`.
    pub fn up_to(end: u64) -> Self {
        Self { start: 0, end }
    }

    /// The first `len` bytes of an object. `len` must be non-zero.
    pub fn first(len: u64) -> Self {
        Self::up_to(len.saturating_sub(1))
    }

    /// Clamps the range to an object of `size` bytes, returning a half-open
    /// `start..end` suitable for slicing.
    pub fn clamp(&self, size: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(size);
        let end = usize::try_from(self.end)
            .unwrap_or(usize::MAX)
            .saturating_add(1)
            .min(size);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_marker() {
        let now = Utc::now();
        assert!(ObjectEntry::new("photos/", 0, now).is_directory_marker());
        assert!(!ObjectEntry::new("photos/", 12, now).is_directory_marker());
        assert!(!ObjectEntry::new("photos/a.jpg", 0, now).is_directory_marker());
    }

    #[test]
    fn test_base_name() {
        let now = Utc::now();
        assert_eq!(ObjectEntry::new("a/b/c.txt", 1, now).base_name(), "c.txt");
        assert_eq!(ObjectEntry::new("c.txt", 1, now).base_name(), "c.txt");
        assert_eq!(ObjectEntry::new("dir/", 0, now).base_name(), "dir/");
    }

    #[test]
    fn test_byte_range_clamp() {
        assert_eq!(ByteRange::up_to(9).clamp(100), 0..10);
        assert_eq!(ByteRange::up_to(99).clamp(10), 0..10);
        assert_eq!(ByteRange::first(4).clamp(10), 0..4);
        assert_eq!(ByteRange { start: 20, end: 30 }.clamp(10), 10..10);
    }
}
