//! # unhook-rs
//!
//! Feed consolidation for e-reader digests.
//!
//! This library turns a flat, possibly incomplete batch of social posts into
//! an ordered list of digest entries: same-author reply chains are merged
//! into one entry, reposts are attributed to the reposter, quoted posts are
//! inlined, and duplicates and short posts are filtered out. Newsletter
//! emails are parsed into digest entries alongside.
//!
//! ## Design Philosophy
//!
//! The pipeline is sans-io:
//! - **Consolidation**: a pure, deterministic function of a batch and options
//! - **Fetching**: delegated to a [`FeedSource`](source::FeedSource), so any
//!   API client or runtime can supply pages
//! - **Output**: serializable [`ConsolidatedUnit`]s for whatever renders the
//!   digest
//!
//! ## Examples
//!
//! ### Consolidating a page payload
//!
//! ```rust
//! use unhook_rs::consolidation::{run, FilterOptions, UnitKind};
//! use unhook_rs::extract::extract_page;
//!
//! let payload = br#"{"feed": [
//!     {"post": {"uri": "at://a/1", "author": {"did": "did:plc:a"},
//!               "record": {"text": "first", "createdAt": "2025-01-06T12:00:00Z"}}},
//!     {"post": {"uri": "at://a/2", "author": {"did": "did:plc:a"},
//!               "record": {"text": "second", "createdAt": "2025-01-06T12:01:00Z",
//!                          "reply": {"parent": {"uri": "at://a/1"}, "root": {"uri": "at://a/1"}}}}}
//! ]}"#;
//!
//! let page = extract_page(payload).unwrap();
//! let units = run(page.records, &FilterOptions::keep_all());
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].kind, UnitKind::Thread);
//! ```
//!
//! ### Fetching through a source
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use unhook_rs::consolidation::FeedSourceExt;
//! use unhook_rs::config::DigestConfig;
//! use unhook_rs::mock::MockFeedSource;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DigestConfig::load("unhook.toml")?;
//! let mut source = MockFeedSource::new(Vec::new());
//! let units = source.consolidated_feed(&config, Utc::now()).await?;
//! for unit in &units {
//!     println!("{} ({} posts)", unit.title(), unit.member_count());
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod consolidation;
pub mod error;
pub mod extract;
pub mod newsletter;
pub mod raw;
pub mod source;
pub mod utils;

// Mock feed source for testing
pub mod mock;

pub use config::DigestConfig;
pub use consolidation::{ConsolidatedUnit, FeedSourceExt, FilterOptions, PostRecord, UnitKind};
pub use error::{Error, Result};
pub use source::{FeedSource, FetchedPage};
