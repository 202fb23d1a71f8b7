//! Core types for the consolidation pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::derive_title;

/// Identity of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    /// Stable identifier (DID, falling back to the handle)
    pub id: String,
    /// Handle, if known
    pub handle: Option<String>,
    /// Display name, if known
    pub display_name: Option<String>,
}

impl Author {
    /// Create an author from a stable identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: None,
            display_name: None,
        }
    }

    /// Set the handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Name to show readers: the handle, else the identifier.
    pub fn display(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.id)
    }
}

/// An image or attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    /// Image URL
    pub url: String,
    /// Alt text
    pub alt: Option<String>,
}

impl MediaRef {
    /// Create a media reference without alt text.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: None,
        }
    }
}

/// A normalized post extracted from one feed item.
///
/// A repost wrapper carries the reposted original in `repost_of`;
/// [`is_repost`](Self::is_repost) is defined by its presence, so the two
/// can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    /// Globally unique identifier
    pub uri: String,
    /// Authoring account (for reposts, the reposter)
    pub author: Author,
    /// Creation time (for reposts, the repost time)
    pub created_at: DateTime<Utc>,
    /// Body with link facets resolved to markdown links
    pub text: String,
    /// Immediate reply parent, possibly outside the batch
    pub reply_parent_uri: Option<String>,
    /// Thread root, possibly outside the batch
    pub reply_root_uri: Option<String>,
    /// The reposted original, for repost wrappers
    pub repost_of: Option<Box<PostRecord>>,
    /// Quoted post, inlined when rendering
    pub quoted_post: Option<Box<PostRecord>>,
    /// Attached images, in order
    pub media_refs: Vec<MediaRef>,
}

impl PostRecord {
    /// Create a standalone post record.
    pub fn new(
        uri: impl Into<String>,
        author: Author,
        created_at: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            author,
            created_at,
            text: text.into(),
            reply_parent_uri: None,
            reply_root_uri: None,
            repost_of: None,
            quoted_post: None,
            media_refs: Vec::new(),
        }
    }

    /// Create a repost wrapper around `original`.
    pub fn repost(
        uri: impl Into<String>,
        reposter: Author,
        created_at: DateTime<Utc>,
        original: PostRecord,
    ) -> Self {
        let mut record = Self::new(uri, reposter, created_at, "");
        record.repost_of = Some(Box::new(original));
        record
    }

    /// Mark this post as a reply to `parent_uri`.
    pub fn with_reply_parent(mut self, parent_uri: impl Into<String>) -> Self {
        self.reply_parent_uri = Some(parent_uri.into());
        self
    }

    /// Set the thread root reference.
    pub fn with_reply_root(mut self, root_uri: impl Into<String>) -> Self {
        self.reply_root_uri = Some(root_uri.into());
        self
    }

    /// Attach a quoted post.
    pub fn with_quote(mut self, quoted: PostRecord) -> Self {
        self.quoted_post = Some(Box::new(quoted));
        self
    }

    /// Append an image reference.
    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media_refs.push(media);
        self
    }

    /// Stable identifier of the author.
    pub fn author_id(&self) -> &str {
        &self.author.id
    }

    /// Whether this record is a repost wrapper.
    pub fn is_repost(&self) -> bool {
        self.repost_of.is_some()
    }

    /// Whether this record replies to another post.
    pub fn is_reply(&self) -> bool {
        self.reply_parent_uri.is_some()
    }

    /// Text as shown to the reader.
    ///
    /// Quoted posts are appended after the post's own text. A repost
    /// renders as its original.
    pub fn rendered_text(&self) -> String {
        if let Some(original) = &self.repost_of {
            return original.rendered_text();
        }

        let own = self.text.trim();
        match &self.quoted_post {
            Some(quoted) => {
                let quote = format!(
                    "Quoted from {}:\n{}",
                    quoted.author.display(),
                    quoted.text.trim()
                );
                if own.is_empty() {
                    quote
                } else {
                    format!("{own}\n\n{quote}")
                }
            }
            None => own.to_string(),
        }
    }
}

/// A same-author reply chain of two or more posts, root first.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadGroup {
    members: Vec<PostRecord>,
}

impl ThreadGroup {
    /// Create a thread group from members in chain order.
    ///
    /// Returns None for chains shorter than two posts.
    pub fn new(members: Vec<PostRecord>) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        Some(Self { members })
    }

    /// URI of the chain root.
    pub fn root_uri(&self) -> &str {
        &self.members[0].uri
    }

    /// The chain root.
    pub fn root(&self) -> &PostRecord {
        &self.members[0]
    }

    /// Members in chain order (root to leaf).
    pub fn members(&self) -> &[PostRecord] {
        &self.members
    }

    /// Number of posts in the chain.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; a thread group has at least two members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Author shared by every member.
    pub fn author_id(&self) -> &str {
        self.members[0].author_id()
    }

    /// Consume the group, returning its members.
    pub fn into_members(self) -> Vec<PostRecord> {
        self.members
    }
}

/// Repost wrappers by one reposter whose targets form one chain.
///
/// Holds a single wrapper when the reposted post stands alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RepostGroup {
    wrappers: Vec<PostRecord>,
}

impl RepostGroup {
    /// Create a group from wrappers ordered by their targets' chain.
    ///
    /// Returns None if the list is empty or contains a non-repost.
    pub fn new(wrappers: Vec<PostRecord>) -> Option<Self> {
        if wrappers.is_empty() || wrappers.iter().any(|w| !w.is_repost()) {
            return None;
        }
        Some(Self { wrappers })
    }

    /// Wrappers in target chain order.
    pub fn wrappers(&self) -> &[PostRecord] {
        &self.wrappers
    }

    /// The reposted originals, in chain order.
    pub fn targets(&self) -> impl Iterator<Item = &PostRecord> {
        self.wrappers.iter().filter_map(|w| w.repost_of.as_deref())
    }

    /// The reposting account.
    pub fn reposter(&self) -> &Author {
        &self.wrappers[0].author
    }

    /// Consume the group, returning its wrappers.
    pub fn into_wrappers(self) -> Vec<PostRecord> {
        self.wrappers
    }
}

/// Output of self-thread detection: a partition of the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Detected self-threads
    pub threads: Vec<ThreadGroup>,
    /// Non-repost posts that belong to no thread
    pub singletons: Vec<PostRecord>,
    /// Reposts, grouped by reposter and target chain
    pub reposts: Vec<RepostGroup>,
}

impl Detection {
    /// Total number of batch records in this partition.
    pub fn record_count(&self) -> usize {
        self.threads.iter().map(|t| t.len()).sum::<usize>()
            + self.singletons.len()
            + self.reposts.iter().map(|r| r.wrappers().len()).sum::<usize>()
    }
}

/// Discriminator of a consolidated unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A standalone post
    Singleton,
    /// A merged self-thread
    Thread,
    /// One or more reposts, attributed to the reposter
    Repost,
}

/// A renderable digest entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedUnit {
    /// What this unit was built from
    pub kind: UnitKind,
    /// Unit identifier
    pub uri: String,
    /// Author of the content (for reposts, the original author)
    pub author: Author,
    /// Timestamp used for chronological placement
    pub anchor: DateTime<Utc>,
    /// Rendered body
    pub text: String,
    /// Images, in member order
    pub media_refs: Vec<MediaRef>,
    /// URIs of the batch records this unit owns
    pub member_uris: Vec<String>,
    /// URIs of reposted originals (repost units only)
    pub original_uris: Vec<String>,
    /// Reposting account (repost units only)
    pub reposted_by: Option<Author>,
    /// Reply parent of the unit's first post
    pub reply_parent_uri: Option<String>,
}

impl ConsolidatedUnit {
    /// Number of posts merged into this unit.
    pub fn member_count(&self) -> usize {
        match self.kind {
            UnitKind::Repost => self.original_uris.len(),
            _ => self.member_uris.len(),
        }
    }

    /// Rendered text length in characters.
    pub fn text_len(&self) -> usize {
        crate::utils::char_len(&self.text)
    }

    /// Title for tables of contents.
    pub fn title(&self) -> String {
        derive_title(&self.text)
    }

    /// Whether this unit is a repost.
    pub fn is_repost(&self) -> bool {
        self.kind == UnitKind::Repost
    }
}
