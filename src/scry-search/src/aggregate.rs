//! Merging and ordering of per-source results.

use std::cmp::Reverse;

use crate::record::MatchResult;

/// Merges local and remote results into one ordered list.
///
/// Order: every name match before every content match, newest first within
/// each group. The sort is stable, so ties keep their source order (local
/// before remote, then walk or listing order).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    max_results: Option<usize>,
}

impl ResultAggregator {
    pub fn new(max_results: Option<usize>) -> Self {
        Self { max_results }
    }

    /// Returns the merged results and whether they were truncated.
    pub fn merge(&self, local: Vec<MatchResult>, remote: Vec<MatchResult>) -> (Vec<MatchResult>, bool) {
        let mut results = local;
        results.extend(remote);
        results.sort_by_key(|r| (r.match_type.rank(), Reverse(r.record.modified_at)));

        let truncated = match self.max_results {
            Some(max) if results.len() > max => {
                results.truncate(max);
                true
            }
            _ => false,
        };
        (results, truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntryKind, ObjectRecord};
    use chrono::{Duration, Utc};
    use scry_store::ObjectEntry;

    fn local(path: &str, age_secs: i64, content: bool) -> MatchResult {
        let at = Utc::now() - Duration::seconds(age_secs);
        let record = ObjectRecord::local(path, EntryKind::File, Some(1), at);
        if content {
            MatchResult::content(record, 1, String::new())
        } else {
            MatchResult::name(record)
        }
    }

    fn remote(key: &str, age_secs: i64) -> MatchResult {
        let at = Utc::now() - Duration::seconds(age_secs);
        MatchResult::name(ObjectRecord::remote(&ObjectEntry::new(key, 1, at)))
    }

    #[test]
    fn test_names_first_then_newest() {
        let aggregator = ResultAggregator::default();
        let (merged, truncated) = aggregator.merge(
            vec![local("old.txt", 100, false), local("hit.txt", 1, true)],
            vec![remote("new.txt", 5)],
        );
        let names: Vec<_> = merged.iter().map(|m| m.record.name.as_str()).collect();
        assert_eq!(names, vec!["new.txt", "old.txt", "hit.txt"]);
        assert!(!truncated);
    }

    #[test]
    fn test_equal_times_keep_source_order() {
        let at = Utc::now();
        let a = MatchResult::name(ObjectRecord::local("a.txt", EntryKind::File, Some(1), at));
        let b = MatchResult::name(ObjectRecord::remote(&ObjectEntry::new("b.txt", 1, at)));
        let (merged, _) = ResultAggregator::default().merge(vec![a], vec![b]);
        assert_eq!(merged[0].record.name, "a.txt");
        assert_eq!(merged[1].record.name, "b.txt");
    }

    #[test]
    fn test_truncation() {
        let aggregator = ResultAggregator::new(Some(2));
        let (merged, truncated) = aggregator.merge(
            vec![local("a", 1, false), local("b", 2, false)],
            vec![remote("c", 3)],
        );
        assert_eq!(merged.len(), 2);
        assert!(truncated);

        let (merged, truncated) = ResultAggregator::new(Some(3)).merge(vec![local("a", 1, false)], vec![]);
        assert_eq!(merged.len(), 1);
        assert!(!truncated);
    }
}
