//! Embed views attached to posts: images, quoted records, and the
//! record-with-media combination of both.

use serde::Deserialize;

use super::{
    lenient_option, lenient_seq, RawAuthor, RawRecord, EMBED_RECORD_VIEW_BLOCKED,
    EMBED_RECORD_VIEW_DETACHED, EMBED_RECORD_VIEW_NOT_FOUND,
};

/// A hydrated embed view.
///
/// The API distinguishes embed kinds by `$type`; the fields are read
/// structurally instead so both wire and model-dump payloads work.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEmbed {
    /// Embed view type
    #[serde(rename = "$type", alias = "py_type", default)]
    pub kind: Option<String>,
    /// Images (images view)
    #[serde(default, deserialize_with = "lenient_seq")]
    pub images: Vec<RawImage>,
    /// Quoted record (record view, or record-with-media wrapper)
    #[serde(default, deserialize_with = "lenient_option")]
    pub record: Option<Box<RawEmbedRecord>>,
    /// Media half of a record-with-media view
    #[serde(default, deserialize_with = "lenient_option")]
    pub media: Option<Box<RawEmbed>>,
}

impl RawEmbed {
    /// The quoted record view, unwrapping a record-with-media embed.
    pub fn quoted_record(&self) -> Option<&RawEmbedRecord> {
        let record = self.record.as_deref()?;
        match record.record.as_deref() {
            Some(inner) if record.value.is_none() => Some(inner),
            _ => Some(record),
        }
    }

    /// Images shown by this embed, including the media half of a
    /// record-with-media embed.
    pub fn images(&self) -> &[RawImage] {
        if !self.images.is_empty() {
            return &self.images;
        }
        self.media
            .as_deref()
            .map(|media| media.images.as_slice())
            .unwrap_or(&[])
    }
}

/// One image of an images view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImage {
    /// Full size image URL
    #[serde(default)]
    pub fullsize: Option<String>,
    /// Thumbnail URL
    #[serde(default)]
    pub thumb: Option<String>,
    /// Alt text
    #[serde(default)]
    pub alt: Option<String>,
}

impl RawImage {
    /// Best available URL: full size, falling back to the thumbnail.
    pub fn url(&self) -> Option<&str> {
        self.fullsize
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.thumb.as_deref().filter(|u| !u.is_empty()))
    }
}

/// A quoted record view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEmbedRecord {
    /// View type (`#viewRecord`, `#viewBlocked`, `#viewNotFound`, ...)
    #[serde(rename = "$type", alias = "py_type", default)]
    pub kind: Option<String>,
    /// Quoted post URI
    #[serde(default)]
    pub uri: Option<String>,
    /// Quoted post author
    #[serde(default, deserialize_with = "lenient_option")]
    pub author: Option<RawAuthor>,
    /// Quoted post record
    #[serde(default, deserialize_with = "lenient_option")]
    pub value: Option<RawRecord>,
    /// Embeds of the quoted post
    #[serde(default, deserialize_with = "lenient_seq")]
    pub embeds: Vec<RawEmbed>,
    /// Inner view of a record-with-media wrapper
    #[serde(default, deserialize_with = "lenient_option")]
    pub record: Option<Box<RawEmbedRecord>>,
}

impl RawEmbedRecord {
    /// Whether the quoted post cannot be shown (blocked, deleted, detached).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self.kind.as_deref(),
            Some(EMBED_RECORD_VIEW_BLOCKED | EMBED_RECORD_VIEW_NOT_FOUND | EMBED_RECORD_VIEW_DETACHED)
        )
    }
}
