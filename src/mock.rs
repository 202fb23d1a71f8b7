//! Mock feed source for testing purposes.
//!
//! This module provides an in-memory [`FeedSource`] that serves queued pages
//! and records every request, so pagination can be tested without a
//! network.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;

use crate::raw::FeedPage;
use crate::source::{FeedSource, FetchedPage};
use crate::{Error, Result};

/// A request received by the mock source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Cursor sent by the caller
    pub cursor: Option<String>,
    /// Page size requested
    pub limit: usize,
}

/// A mock feed source that serves a fixed series of pages.
///
/// In strict mode the mock also checks that each request carries the cursor
/// returned with the previous page (out of band or inside the payload), and
/// fails once the queue runs dry.
pub struct MockFeedSource {
    pages: VecDeque<FetchedPage>,
    requests: Vec<PageRequest>,
    expected_cursor: Option<String>,
    strict_mode: bool,
}

impl MockFeedSource {
    /// Create a strict mock serving `pages` in order.
    pub fn new(pages: Vec<FetchedPage>) -> Self {
        Self {
            pages: pages.into(),
            requests: Vec::new(),
            expected_cursor: None,
            strict_mode: true,
        }
    }

    /// Create a mock in non-strict mode.
    ///
    /// In non-strict mode, an unexpected cursor or an exhausted queue yields
    /// an empty page rather than an error.
    pub fn new_relaxed(pages: Vec<FetchedPage>) -> Self {
        Self {
            strict_mode: false,
            ..Self::new(pages)
        }
    }

    /// Serve the next page for a request.
    pub fn handle_request(&mut self, cursor: Option<&str>, limit: usize) -> Result<FetchedPage> {
        self.requests.push(PageRequest {
            cursor: cursor.map(str::to_string),
            limit,
        });

        if cursor != self.expected_cursor.as_deref() {
            if self.strict_mode {
                return Err(Error::Source(format!(
                    "Expected cursor {:?}, got {cursor:?}",
                    self.expected_cursor
                )));
            }
            return Ok(empty_page());
        }

        match self.pages.pop_front() {
            Some(page) => {
                self.expected_cursor = page.cursor.clone().or_else(|| payload_cursor(&page));
                Ok(page)
            }
            None if self.strict_mode => {
                Err(Error::Source("No more pages queued".to_string()))
            }
            None => Ok(empty_page()),
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> &[PageRequest] {
        &self.requests
    }

    /// Check if every queued page has been served.
    pub fn is_complete(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get the number of pages not yet served.
    pub fn remaining_pages(&self) -> usize {
        self.pages.len()
    }

    /// Reset the mock with a new series of pages.
    pub fn reset(&mut self, pages: Vec<FetchedPage>) {
        self.pages = pages.into();
        self.requests.clear();
        self.expected_cursor = None;
    }
}

/// Cursor carried inside the page payload itself.
fn payload_cursor(page: &FetchedPage) -> Option<String> {
    FeedPage::parse(&page.payload).ok().and_then(|p| p.cursor)
}

fn empty_page() -> FetchedPage {
    FetchedPage::new(Bytes::from_static(br#"{"feed": []}"#), None)
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch_page(&mut self, cursor: Option<&str>, limit: usize) -> Result<FetchedPage> {
        self.handle_request(cursor, limit)
    }
}
