//! The feed fetch seam.
//!
//! Network access and authentication against the social API live outside
//! this crate. A [`FeedSource`] hands back raw page payloads; decoding,
//! pagination and consolidation happen here.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// One page as delivered by a feed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Raw page payload (JSON)
    pub payload: Bytes,
    /// Cursor for the next page, if the source reports one out of band
    pub cursor: Option<String>,
}

impl FetchedPage {
    /// Create a page from a payload and cursor.
    pub fn new(payload: impl Into<Bytes>, cursor: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            cursor,
        }
    }

    /// Create a page from a JSON value.
    pub fn from_json(value: &serde_json::Value, cursor: Option<&str>) -> Self {
        Self::new(value.to_string(), cursor.map(str::to_string))
    }
}

/// A source of timeline pages.
///
/// Implementations wrap an authenticated API client. `limit` is a hint for
/// the page size; sources may return fewer items.
#[async_trait]
pub trait FeedSource: Send {
    /// Fetch the page after `cursor` (the first page when None).
    async fn fetch_page(&mut self, cursor: Option<&str>, limit: usize) -> Result<FetchedPage>;
}
