//! Digest configuration.
//!
//! Settings are read from a TOML document; every key is optional.
//!
//! ```toml
//! limit = 200
//! min_length = 100
//! repost_min_length = 300
//! since_hours = 24
//! order = "descending"
//! exclude_replies = false
//! ```

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::consolidation::{
    FilterOptions, SortOrder, DEFAULT_MIN_LENGTH, DEFAULT_REPOST_MIN_LENGTH, MAX_FETCH_LIMIT,
};
use crate::error::{Error, Result};

/// Default number of feed items fetched per digest.
pub const DEFAULT_LIMIT: usize = 200;

/// Default look-back window in hours.
pub const DEFAULT_SINCE_HOURS: i64 = 24;

/// Settings for one digest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestConfig {
    /// Maximum feed items to fetch
    pub limit: usize,
    /// Minimum characters for posts and threads
    pub min_length: usize,
    /// Minimum characters for reposts
    pub repost_min_length: usize,
    /// Only keep units from the last N hours (no cutoff when absent)
    pub since_hours: Option<i64>,
    /// Output order
    pub order: SortOrder,
    /// Drop posts and threads that start with a reply
    pub exclude_replies: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            min_length: DEFAULT_MIN_LENGTH,
            repost_min_length: DEFAULT_REPOST_MIN_LENGTH,
            since_hours: Some(DEFAULT_SINCE_HOURS),
            order: SortOrder::default(),
            exclude_replies: false,
        }
    }
}

impl DigestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_FETCH_LIMIT {
            return Err(Error::Config(format!(
                "limit must be between 1 and {MAX_FETCH_LIMIT}, got {}",
                self.limit
            )));
        }
        if let Some(hours) = self.since_hours {
            if hours <= 0 {
                return Err(Error::Config(format!(
                    "since_hours must be positive, got {hours}"
                )));
            }
        }
        Ok(())
    }

    /// The recency cutoff relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.since_hours
            .and_then(Duration::try_hours)
            .and_then(|window| now.checked_sub_signed(window))
    }

    /// Filter options for a run at `now`.
    pub fn filter_options(&self, now: DateTime<Utc>) -> FilterOptions {
        FilterOptions {
            min_length: self.min_length,
            repost_min_length: self.repost_min_length,
            since: self.since(now),
            order: self.order,
            exclude_replies: self.exclude_replies,
        }
    }
}
