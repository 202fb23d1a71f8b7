//! Typed representation of raw feed payloads.
//!
//! The social API returns timeline pages as JSON, either in wire form
//! (`$type`, `createdAt`, ...) or as a model dump (`py_type`, `created_at`,
//! ...). Both spellings are accepted. Fields a post cannot exist without
//! (`uri`, `author`, `record`, `record.created_at`) are non-optional, so a
//! malformed item fails to deserialize and is skipped as a whole.
//! Secondary fields (facets, embeds, repost reasons) are deserialized
//! leniently: a malformed facet drops that facet, not the post.

mod embed;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::{Error, Result};
use crate::utils::decode_text_with_encoding;

pub use embed::{RawEmbed, RawEmbedRecord, RawImage};

/// Record type of an original post.
pub const POST_TYPE: &str = "app.bsky.feed.post";
/// Record type of a repost record.
pub const REPOST_TYPE: &str = "app.bsky.feed.repost";
/// Suffix of the feed reason type marking a repost.
pub const REASON_REPOST: &str = "reasonRepost";
/// Facet feature type for links.
pub const LINK_FACET: &str = "app.bsky.richtext.facet#link";
/// Quote view type for a blocked quoted post.
pub const EMBED_RECORD_VIEW_BLOCKED: &str = "app.bsky.embed.record#viewBlocked";
/// Quote view type for a deleted or missing quoted post.
pub const EMBED_RECORD_VIEW_NOT_FOUND: &str = "app.bsky.embed.record#viewNotFound";
/// Quote view type for a quote detached by its author.
pub const EMBED_RECORD_VIEW_DETACHED: &str = "app.bsky.embed.record#viewDetached";

/// One page of a timeline or author feed.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// Feed items, still undecoded
    pub feed: Vec<serde_json::Value>,
    /// Cursor for the next page, if any
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
struct FeedEnvelope {
    feed: Vec<serde_json::Value>,
    #[serde(default)]
    cursor: Option<String>,
}

impl FeedPage {
    /// Parse a page payload.
    ///
    /// Accepts either a `{"feed": [...], "cursor": ...}` envelope or a bare
    /// JSON array of items. Anything else is an [`Error::InvalidPayload`].
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = decode_text_with_encoding(payload);
        let value: serde_json::Value = serde_json::from_str(&text)?;

        match value {
            serde_json::Value::Array(feed) => Ok(Self { feed, cursor: None }),
            serde_json::Value::Object(_) => {
                let envelope: FeedEnvelope = serde_json::from_value(value).map_err(|e| {
                    Error::InvalidPayload(format!("feed page without feed array: {e}"))
                })?;
                Ok(Self {
                    feed: envelope.feed,
                    cursor: envelope.cursor.filter(|c| !c.is_empty()),
                })
            }
            other => Err(Error::InvalidPayload(format!(
                "expected feed object or array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decode the page's items, skipping malformed ones.
    ///
    /// Returns the decoded items in page order and the number skipped.
    pub fn into_items(self) -> (Vec<RawFeedItem>, usize) {
        let mut items = Vec::with_capacity(self.feed.len());
        let mut skipped = 0;

        for (position, value) in self.feed.into_iter().enumerate() {
            match serde_json::from_value::<RawFeedItem>(value) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(position, error = %e, "skipping malformed feed item");
                    skipped += 1;
                }
            }
        }

        (items, skipped)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// One entry of a feed page.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedItem {
    /// The post shown by this entry (for reposts, the reposted original)
    pub post: RawPostView,
    /// Why the post appears in the feed (e.g. someone reposted it)
    #[serde(default, deserialize_with = "lenient_option")]
    pub reason: Option<RawReason>,
}

impl RawFeedItem {
    /// Classify this entry into the typed item variants.
    pub fn into_item(self) -> FeedItem {
        match self.reason {
            Some(reason) if reason.is_repost() => FeedItem::Repost {
                reason,
                post: self.post,
            },
            _ => FeedItem::Post(self.post),
        }
    }
}

/// A feed entry classified by what it represents.
#[derive(Debug, Clone)]
pub enum FeedItem {
    /// An original post (possibly a reply or a quote)
    Post(RawPostView),
    /// A repost wrapper around another account's post
    Repost {
        /// Who reposted, and when
        reason: RawReason,
        /// The reposted original
        post: RawPostView,
    },
}

/// Reason attached to a feed entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReason {
    /// Reason type (`app.bsky.feed.defs#reasonRepost`, `...#reasonPin`)
    #[serde(rename = "$type", alias = "py_type", default)]
    pub kind: String,
    /// Account responsible for the reason
    #[serde(default, deserialize_with = "lenient_option")]
    pub by: Option<RawAuthor>,
    /// URI of the repost record, when the API provides it
    #[serde(default)]
    pub uri: Option<String>,
    /// When the reason was indexed
    #[serde(default, alias = "indexedAt")]
    pub indexed_at: Option<String>,
}

impl RawReason {
    /// Whether this reason marks a repost.
    pub fn is_repost(&self) -> bool {
        self.kind.ends_with(REASON_REPOST)
    }
}

/// A hydrated post view.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPostView {
    /// Post URI
    pub uri: String,
    /// Content identifier
    #[serde(default)]
    pub cid: Option<String>,
    /// Author profile
    pub author: RawAuthor,
    /// The post record itself
    pub record: RawRecord,
    /// Hydrated embed (images, quote, ...)
    #[serde(default, deserialize_with = "lenient_option")]
    pub embed: Option<RawEmbed>,
    /// When the post was indexed
    #[serde(default, alias = "indexedAt")]
    pub indexed_at: Option<String>,
}

/// Author profile as embedded in post views.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthor {
    /// Decentralized identifier (stable)
    #[serde(default)]
    pub did: Option<String>,
    /// Handle (may change over time)
    #[serde(default)]
    pub handle: Option<String>,
    /// Display name
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
}

/// A post (or repost) record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    /// Record type
    #[serde(rename = "$type", alias = "py_type", default)]
    pub kind: Option<String>,
    /// Plain text body
    #[serde(default)]
    pub text: Option<String>,
    /// Creation timestamp (RFC 3339)
    #[serde(alias = "createdAt")]
    pub created_at: String,
    /// Reply references
    #[serde(default, deserialize_with = "lenient_option")]
    pub reply: Option<RawReplyRef>,
    /// Rich-text annotations over byte ranges of `text`
    #[serde(default, deserialize_with = "lenient_seq")]
    pub facets: Vec<RawFacet>,
    /// Subject of a repost record
    #[serde(default, deserialize_with = "lenient_option")]
    pub subject: Option<RawStrongRef>,
}

impl RawRecord {
    /// Whether this record is a repost record rather than a post.
    pub fn is_repost_record(&self) -> bool {
        self.kind.as_deref() == Some(REPOST_TYPE)
    }
}

/// Reply references of a post record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReplyRef {
    /// Immediate parent
    #[serde(default, deserialize_with = "lenient_option")]
    pub parent: Option<RawStrongRef>,
    /// Thread root
    #[serde(default, deserialize_with = "lenient_option")]
    pub root: Option<RawStrongRef>,
}

/// A reference to another record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStrongRef {
    /// Referenced URI
    #[serde(default)]
    pub uri: Option<String>,
    /// Referenced CID
    #[serde(default)]
    pub cid: Option<String>,
    /// Nested reference, as produced by some model dumps
    #[serde(rename = "ref", default, deserialize_with = "lenient_option")]
    pub reference: Option<Box<RawStrongRef>>,
}

impl RawStrongRef {
    /// The referenced URI, looking through a nested `ref` when needed.
    pub fn resolved_uri(&self) -> Option<&str> {
        match self.uri.as_deref() {
            Some(uri) if !uri.is_empty() => Some(uri),
            _ => self
                .reference
                .as_deref()
                .and_then(|r| r.uri.as_deref())
                .filter(|uri| !uri.is_empty()),
        }
    }
}

/// A rich-text facet: features attached to a byte range of the text.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFacet {
    /// Byte range in the UTF-8 text
    pub index: RawByteSlice,
    /// Features of the range
    #[serde(default, deserialize_with = "lenient_seq")]
    pub features: Vec<RawFacetFeature>,
}

impl RawFacet {
    /// The link target of this facet, if it carries a link feature.
    pub fn link_uri(&self) -> Option<&str> {
        self.features
            .iter()
            .find(|f| f.is_link())
            .and_then(|f| f.uri.as_deref())
    }
}

/// Byte range of a facet, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RawByteSlice {
    /// Inclusive start
    #[serde(alias = "byteStart")]
    pub byte_start: usize,
    /// Exclusive end
    #[serde(alias = "byteEnd")]
    pub byte_end: usize,
}

/// One facet feature (link, mention or tag).
#[derive(Debug, Clone, Deserialize)]
pub struct RawFacetFeature {
    /// Feature type
    #[serde(rename = "$type", alias = "py_type", default)]
    pub kind: String,
    /// Link target
    #[serde(default)]
    pub uri: Option<String>,
    /// Mentioned account
    #[serde(default)]
    pub did: Option<String>,
    /// Hashtag
    #[serde(default)]
    pub tag: Option<String>,
}

impl RawFacetFeature {
    /// Whether this feature is a link.
    pub fn is_link(&self) -> bool {
        self.kind == LINK_FACET && self.uri.is_some()
    }
}

/// Deserialize an optional value, treating a malformed value as absent.
pub(crate) fn lenient_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Deserialize a sequence, dropping malformed elements.
pub(crate) fn lenient_seq<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        Some(serde_json::Value::Array(elements)) => Ok(elements
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_json(uri: &str, text: &str) -> serde_json::Value {
        json!({
            "post": {
                "uri": uri,
                "author": {"did": "did:plc:alice", "handle": "alice.bsky.social"},
                "record": {"text": text, "createdAt": "2025-01-06T14:04:52.233Z"}
            }
        })
    }

    #[test]
    fn test_feed_page_envelope() {
        let payload = json!({
            "feed": [post_json("at://a/1", "one")],
            "cursor": "next-page"
        })
        .to_string();

        let page = FeedPage::parse(payload.as_bytes()).unwrap();
        assert_eq!(page.feed.len(), 1);
        assert_eq!(page.cursor.as_deref(), Some("next-page"));
    }

    #[test]
    fn test_feed_page_bare_array_and_empty_cursor() {
        let page = FeedPage::parse(b"[]").unwrap();
        assert!(page.feed.is_empty());
        assert!(page.cursor.is_none());

        let page = FeedPage::parse(br#"{"feed": [], "cursor": ""}"#).unwrap();
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_feed_page_invalid_payloads() {
        assert!(matches!(
            FeedPage::parse(b"not json"),
            Err(Error::InvalidPayload(_))
        ));
        assert!(matches!(
            FeedPage::parse(b"42"),
            Err(Error::InvalidPayload(msg)) if msg.contains("number")
        ));
        assert!(matches!(
            FeedPage::parse(br#"{"posts": []}"#),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_into_items_skips_malformed() {
        let page = FeedPage {
            feed: vec![
                post_json("at://a/1", "one"),
                json!({"post": {"uri": "at://a/2"}}), // no author or record
                json!("not an item"),
                post_json("at://a/3", "three"),
            ],
            cursor: None,
        };

        let (items, skipped) = page.into_items();
        assert_eq!(skipped, 2);
        let uris: Vec<&str> = items.iter().map(|i| i.post.uri.as_str()).collect();
        assert_eq!(uris, vec!["at://a/1", "at://a/3"]);
    }

    #[test]
    fn test_record_accepts_model_dump_spelling() {
        let item: RawFeedItem = serde_json::from_value(json!({
            "post": {
                "uri": "at://a/1",
                "author": {"did": "did:plc:alice", "display_name": "Alice"},
                "record": {
                    "py_type": "app.bsky.feed.post",
                    "text": "hi",
                    "created_at": "2025-01-06T14:04:52Z",
                    "reply": {"parent": {"ref": {"uri": "at://a/0"}}}
                }
            }
        }))
        .unwrap();

        assert_eq!(item.post.record.kind.as_deref(), Some(POST_TYPE));
        assert_eq!(item.post.author.display_name.as_deref(), Some("Alice"));
        let parent = item.post.record.reply.as_ref().and_then(|r| r.parent.as_ref());
        assert_eq!(parent.and_then(|p| p.resolved_uri()), Some("at://a/0"));
    }

    #[test]
    fn test_repost_reason_detection() {
        let mut value = post_json("at://a/1", "one");
        value["reason"] = json!({
            "$type": "app.bsky.feed.defs#reasonRepost",
            "by": {"did": "did:plc:bob", "handle": "bob.bsky.social"}
        });
        let item: RawFeedItem = serde_json::from_value(value).unwrap();
        assert!(matches!(item.into_item(), FeedItem::Repost { .. }));

        let mut value = post_json("at://a/1", "one");
        value["reason"] = json!({"py_type": "app.bsky.feed.defs#reasonRepost"});
        let item: RawFeedItem = serde_json::from_value(value).unwrap();
        assert!(matches!(item.into_item(), FeedItem::Repost { .. }));
    }

    #[test]
    fn test_non_object_reason_is_ignored() {
        let mut value = post_json("at://a/1", "one");
        value["reason"] = json!("not a dict");
        let item: RawFeedItem = serde_json::from_value(value).unwrap();
        assert!(item.reason.is_none());
        assert!(matches!(item.into_item(), FeedItem::Post(_)));
    }

    #[test]
    fn test_malformed_facets_are_dropped() {
        let record: RawRecord = serde_json::from_value(json!({
            "text": "see example",
            "createdAt": "2025-01-06T14:04:52Z",
            "facets": [
                {"index": {"byteStart": 4, "byteEnd": 11},
                 "features": [{"$type": LINK_FACET, "uri": "https://example.com"}]},
                {"index": {"byteStart": -1, "byteEnd": 3}, "features": []},
                "garbage"
            ]
        }))
        .unwrap();

        assert_eq!(record.facets.len(), 1);
        assert_eq!(record.facets[0].link_uri(), Some("https://example.com"));
        assert_eq!(
            record.facets[0].index,
            RawByteSlice {
                byte_start: 4,
                byte_end: 11
            }
        );
    }

    #[test]
    fn test_repost_record_type() {
        let record: RawRecord = serde_json::from_value(json!({
            "$type": REPOST_TYPE,
            "createdAt": "2025-01-06T14:04:52Z",
            "subject": {"uri": "at://a/1", "cid": "bafy"}
        }))
        .unwrap();
        assert!(record.is_repost_record());
        assert_eq!(
            record.subject.as_ref().and_then(|s| s.resolved_uri()),
            Some("at://a/1")
        );
    }
}
