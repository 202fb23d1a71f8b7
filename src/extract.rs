//! Content extraction: raw feed items to [`PostRecord`]s.
//!
//! Extraction is a pure transform. Items missing something a post cannot
//! exist without (a usable author identifier, a parseable timestamp, the
//! wrapped post of a repost) are skipped with a warning instead of failing
//! the page.

use tracing::{debug, warn};

use crate::consolidation::{Author, MediaRef, PostRecord};
use crate::error::Result;
use crate::raw::{
    FeedItem, FeedPage, RawAuthor, RawEmbed, RawFacet, RawFeedItem, RawPostView, RawReason,
    RawRecord,
};
use crate::utils::parse_timestamp;

/// Maximum quote nesting that is resolved.
///
/// A quote of a quote renders with the immediate quoted text only. Quote
/// graphs come from outside and may be cyclic or arbitrarily deep.
pub const MAX_QUOTE_DEPTH: usize = 1;

/// Records extracted from one feed page.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Extracted records in page order
    pub records: Vec<PostRecord>,
    /// Cursor for the next page
    pub cursor: Option<String>,
    /// Number of items skipped as malformed
    pub skipped: usize,
}

/// Decode and extract a whole page payload.
///
/// Fails only if the payload is not a feed at all; malformed items are
/// skipped and counted.
pub fn extract_page(payload: &[u8]) -> Result<ExtractedPage> {
    let page = FeedPage::parse(payload)?;
    let cursor = page.cursor.clone();
    let (items, undecodable) = page.into_items();
    let (records, unusable) = extract_items(items);

    Ok(ExtractedPage {
        records,
        cursor,
        skipped: undecodable + unusable,
    })
}

/// Extract a list of decoded items, returning records and the skip count.
pub fn extract_items(items: impl IntoIterator<Item = RawFeedItem>) -> (Vec<PostRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;
    for item in items {
        match extract_item(item) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }
    (records, skipped)
}

/// Extract one feed item, or None if it is malformed.
pub fn extract_item(item: RawFeedItem) -> Option<PostRecord> {
    match item.into_item() {
        FeedItem::Post(view) => extract_post(&view),
        FeedItem::Repost { reason, post } => extract_repost(&reason, &post),
    }
}

fn extract_post(view: &RawPostView) -> Option<PostRecord> {
    if view.record.is_repost_record() {
        warn!(uri = %view.uri, "skipping repost record without a hydrated post");
        return None;
    }

    let Some(author) = author_from(&view.author) else {
        warn!(uri = %view.uri, "skipping post without author identifier");
        return None;
    };

    let created_at = match parse_timestamp(&view.record.created_at) {
        Ok(ts) => ts,
        Err(e) => {
            warn!(uri = %view.uri, error = %e, "skipping post with unparseable timestamp");
            return None;
        }
    };

    let mut record = PostRecord::new(
        view.uri.clone(),
        author,
        created_at,
        record_text(&view.record),
    );
    apply_reply_refs(&mut record, &view.record);

    if let Some(embed) = &view.embed {
        record.media_refs = media_from(embed);
        record.quoted_post = extract_quote(embed, 1).map(Box::new);
    }

    Some(record)
}

fn extract_repost(reason: &RawReason, post: &RawPostView) -> Option<PostRecord> {
    let original = extract_post(post)?;

    // Unattributed reposts still carry a valid post
    let Some(reposter) = reason.by.as_ref().and_then(author_from) else {
        debug!(uri = %post.uri, "repost without reposter identity, keeping original post");
        return Some(original);
    };

    let created_at = reason
        .indexed_at
        .as_deref()
        .and_then(|ts| parse_timestamp(ts).ok())
        .unwrap_or(original.created_at);

    let uri = reason
        .uri
        .clone()
        .filter(|uri| !uri.is_empty())
        .unwrap_or_else(|| format!("{}#repost-{}", original.uri, reposter.id));

    Some(PostRecord::repost(uri, reposter, created_at, original))
}

/// Extract the quoted post of an embed at the given nesting depth.
fn extract_quote(embed: &RawEmbed, depth: usize) -> Option<PostRecord> {
    if depth > MAX_QUOTE_DEPTH {
        return None;
    }

    let quoted = embed.quoted_record()?;
    if quoted.is_unavailable() {
        debug!(uri = ?quoted.uri, "quoted post unavailable");
        return None;
    }

    let uri = quoted.uri.clone().filter(|u| !u.is_empty())?;
    let author = quoted.author.as_ref().and_then(author_from)?;
    let value = quoted.value.as_ref()?;
    let created_at = match parse_timestamp(&value.created_at) {
        Ok(ts) => ts,
        Err(e) => {
            debug!(uri = %uri, error = %e, "dropping quote with unparseable timestamp");
            return None;
        }
    };

    let mut record = PostRecord::new(uri, author, created_at, record_text(value));
    apply_reply_refs(&mut record, value);

    for nested in &quoted.embeds {
        record.media_refs.extend(media_from(nested));
        if record.quoted_post.is_none() {
            record.quoted_post = extract_quote(nested, depth + 1).map(Box::new);
        }
    }

    Some(record)
}

fn author_from(raw: &RawAuthor) -> Option<Author> {
    let id = raw
        .did
        .as_deref()
        .filter(|d| !d.is_empty())
        .or_else(|| raw.handle.as_deref().filter(|h| !h.is_empty()))?;

    Some(Author {
        id: id.to_string(),
        handle: raw.handle.clone().filter(|h| !h.is_empty()),
        display_name: raw.display_name.clone().filter(|n| !n.is_empty()),
    })
}

fn record_text(record: &RawRecord) -> String {
    let text = record.text.as_deref().unwrap_or("");
    resolve_link_facets(text, &record.facets)
}

fn apply_reply_refs(record: &mut PostRecord, raw: &RawRecord) {
    if let Some(reply) = &raw.reply {
        record.reply_parent_uri = reply
            .parent
            .as_ref()
            .and_then(|p| p.resolved_uri())
            .map(str::to_string);
        record.reply_root_uri = reply
            .root
            .as_ref()
            .and_then(|r| r.resolved_uri())
            .map(str::to_string);
    }
}

fn media_from(embed: &RawEmbed) -> Vec<MediaRef> {
    embed
        .images()
        .iter()
        .filter_map(|image| {
            image.url().map(|url| MediaRef {
                url: url.to_string(),
                alt: image.alt.clone().filter(|a| !a.is_empty()),
            })
        })
        .collect()
}

/// Rewrite link facets over `text` as inline markdown links.
///
/// Facet ranges are UTF-8 byte offsets. Ranges that are empty, out of
/// bounds, not on character boundaries, or overlapping an earlier link are
/// skipped; the text they cover is kept as-is.
///
/// # Example
///
/// ```
/// use unhook_rs::extract::resolve_link_facets;
///
/// assert_eq!(resolve_link_facets("no links here", &[]), "no links here");
/// ```
pub fn resolve_link_facets(text: &str, facets: &[RawFacet]) -> String {
    let mut links: Vec<(usize, usize, &str)> = facets
        .iter()
        .filter_map(|facet| {
            let uri = facet.link_uri()?;
            let (start, end) = (facet.index.byte_start, facet.index.byte_end);
            if start >= end
                || end > text.len()
                || !text.is_char_boundary(start)
                || !text.is_char_boundary(end)
            {
                debug!(start, end, len = text.len(), "skipping out-of-range link facet");
                return None;
            }
            Some((start, end, uri))
        })
        .collect();

    if links.is_empty() {
        return text.to_string();
    }

    links.sort_by_key(|&(start, end, _)| (start, end));

    let mut resolved = String::with_capacity(text.len() + links.len() * 32);
    let mut cursor = 0;
    for (start, end, uri) in links {
        if start < cursor {
            debug!(start, end, "skipping overlapping link facet");
            continue;
        }
        resolved.push_str(&text[cursor..start]);
        resolved.push('[');
        resolved.push_str(&text[start..end]);
        resolved.push_str("](");
        resolved.push_str(uri);
        resolved.push(')');
        cursor = end;
    }
    resolved.push_str(&text[cursor..]);

    resolved
}
