//! Extension trait for fetching and consolidating feeds.
//!
//! This module defines the `FeedSourceExt` trait which adds pagination and
//! consolidation on top of any [`FeedSource`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::DigestConfig;
use crate::error::Result;
use crate::extract::extract_page;
use crate::source::FeedSource;

use super::run::run;
use super::types::{ConsolidatedUnit, PostRecord};

/// Largest batch a single fetch may request.
pub const MAX_FETCH_LIMIT: usize = 1000;

/// Largest page requested from a source.
pub const PAGE_SIZE: usize = 100;

/// Extension trait adding batch fetching and consolidation to feed sources.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use serde_json::json;
/// use unhook_rs::consolidation::FeedSourceExt;
/// use unhook_rs::mock::MockFeedSource;
/// use unhook_rs::source::FetchedPage;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let page = json!({"feed": [{
///     "post": {
///         "uri": "at://did:plc:a/app.bsky.feed.post/1",
///         "author": {"did": "did:plc:a"},
///         "record": {"text": "hello", "createdAt": "2025-01-06T12:00:00Z"}
///     }
/// }]});
/// let mut source = MockFeedSource::new(vec![FetchedPage::from_json(&page, None)]);
///
/// let records = source.fetch_batch(50, None).await?;
/// assert_eq!(records.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FeedSourceExt {
    /// Fetch up to `limit` records, newest pages first.
    ///
    /// Pages are requested with size `min(100, remaining)`. Pagination stops
    /// at `limit`, an empty page, a missing or repeated cursor, or (with
    /// `since`) a page holding nothing newer than the cutoff. Records older than `since` are
    /// dropped. `limit` is capped at [`MAX_FETCH_LIMIT`].
    async fn fetch_batch(
        &mut self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PostRecord>>;

    /// Fetch a batch per `config` and run the consolidation pipeline.
    async fn consolidated_feed(
        &mut self,
        config: &DigestConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsolidatedUnit>>;
}

/// Blanket implementation of `FeedSourceExt` for every `FeedSource`.
#[async_trait]
impl<S: FeedSource + ?Sized> FeedSourceExt for S {
    async fn fetch_batch(
        &mut self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PostRecord>> {
        let limit = if limit > MAX_FETCH_LIMIT {
            warn!(limit, max = MAX_FETCH_LIMIT, "capping fetch limit");
            MAX_FETCH_LIMIT
        } else {
            limit
        };

        let mut records: Vec<PostRecord> = Vec::with_capacity(limit);
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        while records.len() < limit {
            let page_size = (limit - records.len()).min(PAGE_SIZE);
            let fetched = self.fetch_page(cursor.as_deref(), page_size).await?;
            let page = extract_page(&fetched.payload)?;
            pages += 1;

            if page.records.is_empty() && page.skipped == 0 {
                break;
            }

            let page_len = page.records.len();
            let mut recent = 0;
            for record in page.records {
                if since.is_some_and(|cutoff| record.created_at < cutoff) {
                    continue;
                }
                recent += 1;
                if records.len() < limit {
                    records.push(record);
                }
            }

            if since.is_some() && page_len > 0 && recent == 0 {
                debug!(pages, "reached records older than cutoff");
                break;
            }

            match fetched.cursor.or(page.cursor) {
                Some(next) if seen_cursors.contains(&next) => {
                    warn!(pages, cursor = %next, "source repeated a cursor, stopping");
                    break;
                }
                Some(next) => {
                    seen_cursors.insert(next.clone());
                    cursor = Some(next);
                }
                None => break,
            }
        }

        debug!(pages, records = records.len(), "fetched batch");
        Ok(records)
    }

    async fn consolidated_feed(
        &mut self,
        config: &DigestConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsolidatedUnit>> {
        config.validate()?;
        let options = config.filter_options(now);
        let records = self.fetch_batch(config.limit, options.since).await?;
        Ok(run(records, &options))
    }
}
