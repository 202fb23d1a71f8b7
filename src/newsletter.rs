//! Newsletter emails as digest entries.
//!
//! Raw RFC 5322 messages are parsed with `mail_parser`. Fetching them
//! (IMAP, labels, credentials) and packaging images into the digest happen
//! outside this crate; this module extracts what the digest needs and
//! rewrites image references to local names.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::utils::escape_html;

/// Title used for emails without a subject.
pub const UNTITLED_EMAIL: &str = "Untitled Email";

/// An image embedded in the email and referenced by Content-ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    /// Decoded image bytes
    pub data: Bytes,
}

/// A newsletter email ready for the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Newsletter {
    /// Subject line
    pub title: String,
    /// Sender address
    pub sender: Option<String>,
    /// Date header
    pub published: DateTime<Utc>,
    /// HTML body (plain text bodies are escaped and wrapped in `<pre>`)
    pub html_body: String,
    /// Inline images keyed by Content-ID (without angle brackets)
    pub inline_images: BTreeMap<String, InlineImage>,
    /// External `http(s)` image URLs referenced by the body, in order
    pub external_image_urls: Vec<String>,
}

fn img_src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("valid img src regex")
    })
}

fn cid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)src=["']cid:([^"']+)["']"#).expect("valid cid regex")
    })
}

/// Parse a raw email.
///
/// Returns None when the message cannot be parsed, has no body, or has no
/// usable Date header.
pub fn parse_newsletter(raw: &[u8]) -> Option<Newsletter> {
    let Some(message) = MessageParser::default().parse(raw) else {
        warn!("skipping unparseable email");
        return None;
    };

    let title = message
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED_EMAIL)
        .to_string();

    let Some(published) = message
        .date()
        .and_then(|date| DateTime::from_timestamp(date.to_timestamp(), 0))
    else {
        warn!(title = %title, "skipping email without a usable Date header");
        return None;
    };

    let html = message.parts.iter().find_map(|part| match &part.body {
        PartType::Html(html) if !html.trim().is_empty() => Some(html.to_string()),
        _ => None,
    });
    let html_body = match html {
        Some(html) => html,
        None => {
            let text = message.parts.iter().find_map(|part| match &part.body {
                PartType::Text(text) if !text.trim().is_empty() => Some(text.to_string()),
                _ => None,
            });
            match text {
                Some(text) => format!("<pre>{}</pre>", escape_html(&text)),
                None => {
                    warn!(title = %title, "skipping email without content");
                    return None;
                }
            }
        }
    };

    let mut inline_images = BTreeMap::new();
    for part in &message.parts {
        let Some(content_id) = part.content_id() else {
            continue;
        };
        let Some(content_type) = part.content_type().filter(|ct| ct.ctype() == "image") else {
            continue;
        };
        let cid = content_id.trim_matches(|c| c == '<' || c == '>').to_string();
        let mime = match content_type.subtype() {
            Some(subtype) => format!("image/{subtype}"),
            None => "image".to_string(),
        };
        inline_images.insert(
            cid,
            InlineImage {
                content_type: mime,
                data: Bytes::copy_from_slice(part.contents()),
            },
        );
    }

    let sender = message
        .from()
        .and_then(|from| from.first())
        .and_then(|addr| addr.address())
        .map(str::to_string);

    let external_image_urls = extract_external_image_urls(&html_body);
    debug!(
        title = %title,
        inline = inline_images.len(),
        external = external_image_urls.len(),
        "parsed newsletter"
    );

    Some(Newsletter {
        title,
        sender,
        published,
        html_body,
        inline_images,
        external_image_urls,
    })
}

/// Parse a batch of emails, keeping those published at or after `since`.
///
/// Emails that fail to parse are skipped. The result is sorted oldest
/// first.
pub fn collect_newsletters<'a, I>(raws: I, since: Option<DateTime<Utc>>) -> Vec<Newsletter>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut newsletters: Vec<Newsletter> = raws
        .into_iter()
        .filter_map(parse_newsletter)
        .filter(|n| since.map_or(true, |cutoff| n.published >= cutoff))
        .collect();
    newsletters.sort_by(|a, b| a.published.cmp(&b.published).then_with(|| a.title.cmp(&b.title)));
    newsletters
}

/// URLs of external (`http`/`https`) images in an HTML body.
///
/// `cid:` and `data:` sources are not included.
pub fn extract_external_image_urls(html: &str) -> Vec<String> {
    img_src_pattern()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|src| src.starts_with("http://") || src.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

/// Point `cid:` image sources at local file names.
///
/// References without a mapping are left untouched.
pub fn replace_cid_references(html: &str, cid_to_filename: &HashMap<String, String>) -> String {
    cid_pattern()
        .replace_all(html, |caps: &Captures<'_>| {
            match cid_to_filename.get(&caps[1]) {
                Some(filename) => format!("src=\"{filename}\""),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace external image URLs with local file names.
pub fn replace_external_image_urls(html: &str, url_to_filename: &HashMap<String, String>) -> String {
    // Longest first, so a URL that prefixes another cannot clobber it
    let mut urls: Vec<(&String, &String)> = url_to_filename.iter().collect();
    urls.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut html = html.to_string();
    for (url, filename) in urls {
        html = html.replace(url.as_str(), filename);
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HTML_EMAIL: &str = "From: Weekly <news@example.com>\r\n\
Subject:  Rust Weekly #42 \r\n\
Date: Mon, 06 Jan 2025 09:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/related; boundary=\"rel\"\r\n\
\r\n\
--rel\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hello</p><img src=\"cid:logo@example\"><img alt=\"x\" src=\"https://cdn.example.com/a.png\"><img src='data:image/png;base64,AAAA'>\r\n\
--rel\r\n\
Content-Type: image/png\r\n\
Content-ID: <logo@example>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--rel--\r\n";

    #[test]
    fn test_parse_html_newsletter() {
        let newsletter = parse_newsletter(HTML_EMAIL.as_bytes()).unwrap();

        assert_eq!(newsletter.title, "Rust Weekly #42");
        assert_eq!(newsletter.sender.as_deref(), Some("news@example.com"));
        assert_eq!(
            newsletter.published,
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap()
        );
        assert!(newsletter.html_body.contains("<p>Hello</p>"));
        assert_eq!(
            newsletter.external_image_urls,
            vec!["https://cdn.example.com/a.png".to_string()]
        );

        let logo = newsletter.inline_images.get("logo@example").unwrap();
        assert_eq!(logo.content_type, "image/png");
        assert_eq!(&logo.data[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_plain_text_newsletter_is_escaped() {
        let raw = "From: a@example.com\r\n\
Date: Mon, 06 Jan 2025 09:30:00 +0000\r\n\
Content-Type: text/plain\r\n\
\r\n\
1 < 2 & \"quotes\"\r\n";

        let newsletter = parse_newsletter(raw.as_bytes()).unwrap();
        assert_eq!(newsletter.title, UNTITLED_EMAIL);
        assert!(newsletter.html_body.starts_with("<pre>"));
        assert!(newsletter
            .html_body
            .contains("1 &lt; 2 &amp; &quot;quotes&quot;"));
    }

    #[test]
    fn test_email_without_date_is_skipped() {
        let raw = "From: a@example.com\r\nSubject: Hi\r\n\r\nbody\r\n";
        assert!(parse_newsletter(raw.as_bytes()).is_none());
    }

    #[test]
    fn test_email_without_body_is_skipped() {
        let raw = "From: a@example.com\r\n\
Subject: Empty\r\n\
Date: Mon, 06 Jan 2025 09:30:00 +0000\r\n\
\r\n";
        assert!(parse_newsletter(raw.as_bytes()).is_none());
    }

    #[test]
    fn test_collect_newsletters_filters_and_sorts() {
        let older = "Subject: Older\r\nDate: Sun, 05 Jan 2025 08:00:00 +0000\r\n\r\nold\r\n";
        let newer = "Subject: Newer\r\nDate: Mon, 06 Jan 2025 08:00:00 +0000\r\n\r\nnew\r\n";
        let ancient = "Subject: Ancient\r\nDate: Wed, 01 Jan 2025 08:00:00 +0000\r\n\r\nx\r\n";
        let raws = [newer.as_bytes(), older.as_bytes(), ancient.as_bytes(), b"".as_slice()];

        let cutoff = Utc.with_ymd_and_hms(2025, 1, 4, 0, 0, 0).unwrap();
        let newsletters = collect_newsletters(raws, Some(cutoff));
        let titles: Vec<&str> = newsletters.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Older", "Newer"]);
    }

    #[test]
    fn test_extract_external_image_urls() {
        let html = r#"<IMG SRC="http://a/1.gif"><img class="x" src='https://b/2.jpg'><img src="cid:abc"><img src="/relative.png">"#;
        assert_eq!(
            extract_external_image_urls(html),
            vec!["http://a/1.gif".to_string(), "https://b/2.jpg".to_string()]
        );
    }

    #[test]
    fn test_replace_cid_references() {
        let html = r#"<img src="cid:logo"><img src='cid:unknown'>"#;
        let mut map = HashMap::new();
        map.insert("logo".to_string(), "images/img_1.png".to_string());

        assert_eq!(
            replace_cid_references(html, &map),
            r#"<img src="images/img_1.png"><img src='cid:unknown'>"#
        );
    }

    #[test]
    fn test_replace_external_image_urls() {
        let html = r#"<img src="https://a/x.png"><img src="https://a/x.png?w=2">"#;
        let mut map = HashMap::new();
        map.insert("https://a/x.png".to_string(), "img_1.png".to_string());
        map.insert("https://a/x.png?w=2".to_string(), "img_2.png".to_string());

        assert_eq!(
            replace_external_image_urls(html, &map),
            r#"<img src="img_1.png"><img src="img_2.png">"#
        );
    }
}
