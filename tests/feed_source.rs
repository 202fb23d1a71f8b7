//! Fetch-and-consolidate tests against the mock feed source.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use unhook_rs::config::DigestConfig;
use unhook_rs::consolidation::{FeedSourceExt, SortOrder, UnitKind};
use unhook_rs::mock::MockFeedSource;
use unhook_rs::source::FetchedPage;

fn item(uri: &str, text: &str, created_at: &str, parent: Option<&str>) -> Value {
    let mut record = json!({"text": text, "createdAt": created_at});
    if let Some(parent) = parent {
        record["reply"] = json!({"parent": {"uri": parent}});
    }
    json!({
        "post": {
            "uri": uri,
            "author": {"did": "did:plc:author", "handle": "author.bsky.social"},
            "record": record
        }
    })
}

fn page(items: Vec<Value>, cursor: Option<&str>) -> FetchedPage {
    FetchedPage::from_json(&json!({ "feed": items, "cursor": cursor }), None)
}

/// A thread split across two pages is reassembled once the batch is
/// complete.
#[tokio::test]
async fn test_thread_across_pages() {
    let long = "x".repeat(60);
    let mut source = MockFeedSource::new(vec![
        page(
            vec![item("at://a/2", &long, "2025-01-06T11:01:00Z", Some("at://a/1"))],
            Some("page-2"),
        ),
        page(
            vec![item("at://a/1", &long, "2025-01-06T11:00:00Z", None)],
            None,
        ),
    ]);

    let config = DigestConfig::from_toml_str("min_length = 50\norder = \"ascending\"").unwrap();
    let now = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
    let units = source.consolidated_feed(&config, now).await.unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].kind, UnitKind::Thread);
    assert_eq!(units[0].member_uris, vec!["at://a/1", "at://a/2"]);
    assert!(source.is_complete());
    assert_eq!(source.requests()[1].cursor.as_deref(), Some("page-2"));
}

/// The payload cursor drives pagination when the source reports none.
#[tokio::test]
async fn test_payload_cursor_followed() {
    let mut source = MockFeedSource::new(vec![
        page(vec![item("at://a/1", "one", "2025-01-06T11:00:00Z", None)], Some("c1")),
        page(vec![item("at://a/0", "zero", "2025-01-06T10:00:00Z", None)], None),
    ]);

    let records = source.fetch_batch(10, None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(source.requests().len(), 2);
}

/// Posts older than the configured window are not fetched or kept.
#[tokio::test]
async fn test_recency_window() {
    let mut source = MockFeedSource::new(vec![
        page(
            vec![
                item("at://a/new", &"n".repeat(200), "2025-01-06T11:00:00Z", None),
                item("at://a/old", &"o".repeat(200), "2025-01-04T11:00:00Z", None),
            ],
            Some("c1"),
        ),
        page(vec![item("at://a/older", "x", "2025-01-03T11:00:00Z", None)], None),
    ]);

    let config = DigestConfig {
        since_hours: Some(24),
        order: SortOrder::Descending,
        ..DigestConfig::default()
    };
    let now = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
    let units = source.consolidated_feed(&config, now).await.unwrap();

    let uris: Vec<&str> = units.iter().map(|u| u.uri.as_str()).collect();
    assert_eq!(uris, vec!["at://a/new"]);
}

/// Source failures surface as errors.
#[tokio::test]
async fn test_source_error_propagates() {
    let mut source = MockFeedSource::new(Vec::new());
    let result = source.fetch_batch(10, None).await;
    assert!(matches!(result, Err(unhook_rs::Error::Source(_))));
}
