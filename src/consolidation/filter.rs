//! Deduplication, thresholds and ordering.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ConsolidatedUnit, PostRecord, UnitKind};

/// Default minimum length of singleton and thread units, in characters.
pub const DEFAULT_MIN_LENGTH: usize = 100;

/// Default minimum length of repost units, in characters.
pub const DEFAULT_REPOST_MIN_LENGTH: usize = 300;

/// Chronological order of the final unit list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

/// Options applied to consolidated units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// Minimum rendered length of singleton and thread units (inclusive)
    pub min_length: usize,
    /// Minimum rendered length of repost units (inclusive)
    pub repost_min_length: usize,
    /// Drop units anchored before this instant
    pub since: Option<DateTime<Utc>>,
    /// Output order
    pub order: SortOrder,
    /// Drop posts and threads whose first post replies to another post
    pub exclude_replies: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            repost_min_length: DEFAULT_REPOST_MIN_LENGTH,
            since: None,
            order: SortOrder::default(),
            exclude_replies: false,
        }
    }
}

impl FilterOptions {
    /// Options that keep every unit.
    pub fn keep_all() -> Self {
        Self {
            min_length: 0,
            repost_min_length: 0,
            ..Self::default()
        }
    }

    /// Set the minimum length for singleton and thread units.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Set the minimum length for repost units.
    pub fn with_repost_min_length(mut self, repost_min_length: usize) -> Self {
        self.repost_min_length = repost_min_length;
        self
    }

    /// Set the recency cutoff.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Set the output order.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Drop units that start with a reply.
    pub fn with_exclude_replies(mut self, exclude_replies: bool) -> Self {
        self.exclude_replies = exclude_replies;
        self
    }

    /// Length threshold for a unit kind.
    pub fn threshold_for(&self, kind: UnitKind) -> usize {
        match kind {
            UnitKind::Repost => self.repost_min_length,
            UnitKind::Singleton | UnitKind::Thread => self.min_length,
        }
    }

    /// Whether a unit passes every filter.
    pub fn accepts(&self, unit: &ConsolidatedUnit) -> bool {
        if unit.text_len() < self.threshold_for(unit.kind) {
            return false;
        }
        if self.since.is_some_and(|since| unit.anchor < since) {
            return false;
        }
        // Repost units never carry a reply parent
        if self.exclude_replies && unit.reply_parent_uri.is_some() {
            return false;
        }
        true
    }
}

/// Drop records whose uri was already seen, keeping the first occurrence.
pub fn dedupe_records(records: Vec<PostRecord>) -> Vec<PostRecord> {
    let before = records.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let deduped: Vec<PostRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.uri.clone()))
        .collect();

    if deduped.len() < before {
        debug!(dropped = before - deduped.len(), "dropped duplicate records");
    }
    deduped
}

/// Apply thresholds and cutoffs, then order the survivors.
pub fn filter_units(units: Vec<ConsolidatedUnit>, options: &FilterOptions) -> Vec<ConsolidatedUnit> {
    let before = units.len();
    let mut kept: Vec<ConsolidatedUnit> = units.into_iter().filter(|u| options.accepts(u)).collect();
    sort_units(&mut kept, options.order);

    debug!(kept = kept.len(), dropped = before - kept.len(), "filtered units");
    kept
}

/// Order units by anchor, breaking ties by uri ascending.
pub fn sort_units(units: &mut [ConsolidatedUnit], order: SortOrder) {
    units.sort_by(|a, b| {
        let by_anchor = match order {
            SortOrder::Descending => b.anchor.cmp(&a.anchor),
            SortOrder::Ascending => a.anchor.cmp(&b.anchor),
        };
        by_anchor.then_with(|| a.uri.cmp(&b.uri))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::types::Author;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
    }

    fn unit(kind: UnitKind, uri: &str, hour: u32, len: usize) -> ConsolidatedUnit {
        ConsolidatedUnit {
            kind,
            uri: uri.to_string(),
            author: Author::new("did:plc:x"),
            anchor: ts(hour),
            text: "a".repeat(len),
            media_refs: Vec::new(),
            member_uris: vec![uri.to_string()],
            original_uris: Vec::new(),
            reposted_by: None,
            reply_parent_uri: None,
        }
    }

    #[test]
    fn test_dedupe_keeps_first_seen() {
        let first = PostRecord::new("at://x/1", Author::new("x"), ts(1), "first");
        let second = PostRecord::new("at://x/1", Author::new("x"), ts(2), "second");
        let other = PostRecord::new("at://x/2", Author::new("x"), ts(3), "other");

        let deduped = dedupe_records(vec![first, other, second]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text, "first");
        assert_eq!(deduped[1].uri, "at://x/2");
    }

    #[test]
    fn test_threshold_inclusive() {
        let options = FilterOptions::default().with_min_length(10);
        assert!(options.accepts(&unit(UnitKind::Singleton, "at://a", 1, 10)));
        assert!(!options.accepts(&unit(UnitKind::Singleton, "at://a", 1, 9)));
        assert!(options.accepts(&unit(UnitKind::Thread, "at://a", 1, 11)));
    }

    #[test]
    fn test_threshold_counts_characters() {
        let options = FilterOptions::keep_all().with_min_length(3);
        let mut short = unit(UnitKind::Singleton, "at://a", 1, 0);
        short.text = "日本語".to_string();
        assert!(options.accepts(&short));
    }

    #[test]
    fn test_thresholds_are_independent() {
        let options = FilterOptions::default()
            .with_min_length(5)
            .with_repost_min_length(50);

        let repost = unit(UnitKind::Repost, "at://r", 1, 20);
        let post = unit(UnitKind::Singleton, "at://p", 1, 20);
        assert!(!options.accepts(&repost));
        assert!(options.accepts(&post));

        let options = options.with_min_length(100).with_repost_min_length(10);
        assert!(options.accepts(&repost));
        assert!(!options.accepts(&post));
    }

    #[test]
    fn test_since_cutoff_on_anchor() {
        let options = FilterOptions::keep_all().with_since(ts(5));
        assert!(options.accepts(&unit(UnitKind::Thread, "at://a", 5, 1)));
        assert!(!options.accepts(&unit(UnitKind::Thread, "at://a", 4, 1)));
    }

    #[test]
    fn test_exclude_replies_covers_singletons_and_threads() {
        let options = FilterOptions::keep_all().with_exclude_replies(true);

        let mut reply = unit(UnitKind::Singleton, "at://a", 1, 1);
        reply.reply_parent_uri = Some("at://elsewhere".to_string());
        assert!(!options.accepts(&reply));

        let mut thread = unit(UnitKind::Thread, "at://t", 1, 1);
        thread.reply_parent_uri = Some("at://elsewhere".to_string());
        assert!(!options.accepts(&thread));

        let top_level = unit(UnitKind::Thread, "at://u", 1, 1);
        assert!(options.accepts(&top_level));
        assert!(options.accepts(&unit(UnitKind::Repost, "at://r", 1, 1)));
    }

    #[test]
    fn test_sort_order_and_ties() {
        let units = vec![
            unit(UnitKind::Singleton, "at://b", 1, 1),
            unit(UnitKind::Singleton, "at://c", 3, 1),
            unit(UnitKind::Singleton, "at://a", 1, 1),
        ];

        let descending = filter_units(units.clone(), &FilterOptions::keep_all());
        let uris: Vec<&str> = descending.iter().map(|u| u.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://c", "at://a", "at://b"]);

        let ascending = filter_units(
            units,
            &FilterOptions::keep_all().with_order(SortOrder::Ascending),
        );
        let uris: Vec<&str> = ascending.iter().map(|u| u.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a", "at://b", "at://c"]);
    }

    #[test]
    fn test_sort_order_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            order: SortOrder,
        }
        let wrapper: Wrapper = serde_json::from_str(r#"{"order": "ascending"}"#).unwrap();
        assert_eq!(wrapper.order, SortOrder::Ascending);
    }
}
