//! Feed consolidation pipeline.
//!
//! This module turns a flat, possibly incomplete batch of post records into
//! an ordered list of digest units:
//!
//! - **Detection**: same-author reply chains become thread groups, reposts
//!   are grouped per reposter
//! - **Merging**: each group becomes one [`ConsolidatedUnit`]
//! - **Filtering**: duplicate uris, length thresholds, recency cutoff and
//!   ordering
//!
//! # Overview
//!
//! - [`PostRecord`]: one normalized feed item
//! - [`ThreadGroup`]: a same-author reply chain, root first
//! - [`RepostGroup`]: one reposter's reposts of a chain
//! - [`ConsolidatedUnit`]: a renderable digest entry
//! - [`FilterOptions`]: thresholds, cutoff and order
//! - [`FeedSourceExt`]: extension trait fetching and consolidating a feed
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use unhook_rs::consolidation::{run, Author, FilterOptions, PostRecord, UnitKind};
//!
//! let alice = Author::new("did:plc:alice").with_handle("alice.bsky.social");
//! let at = |m| Utc.with_ymd_and_hms(2025, 1, 6, 12, m, 0).unwrap();
//!
//! let records = vec![
//!     PostRecord::new("at://alice/2", alice.clone(), at(1), "second part")
//!         .with_reply_parent("at://alice/1"),
//!     PostRecord::new("at://alice/1", alice, at(0), "first part"),
//! ];
//!
//! let units = run(records, &FilterOptions::keep_all());
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].kind, UnitKind::Thread);
//! assert_eq!(units[0].text, "first part\n\nsecond part");
//! ```

mod algorithm;
mod ext;
mod filter;
mod merge;
mod run;
mod types;

pub use algorithm::{find_self_threads, group_reposts};
pub use ext::{FeedSourceExt, MAX_FETCH_LIMIT, PAGE_SIZE};
pub use filter::{
    dedupe_records, filter_units, sort_units, FilterOptions, SortOrder, DEFAULT_MIN_LENGTH,
    DEFAULT_REPOST_MIN_LENGTH,
};
pub use merge::{
    consolidate, merge_reposts, merge_thread, single_unit, MERGE_SEPARATOR, THREAD_URI_SUFFIX,
};
pub use run::{run, run_with_stats, Consolidation, RunStats};
pub use types::{
    Author, ConsolidatedUnit, Detection, MediaRef, PostRecord, RepostGroup, ThreadGroup, UnitKind,
};
