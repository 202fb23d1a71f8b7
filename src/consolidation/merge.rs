//! Merging detected groups into consolidated units.

use tracing::debug;

use super::types::{
    ConsolidatedUnit, Detection, MediaRef, PostRecord, RepostGroup, ThreadGroup, UnitKind,
};

/// Suffix appended to a thread root's uri to form the thread unit's uri.
pub const THREAD_URI_SUFFIX: &str = "#thread";

/// Separator between merged post bodies.
pub const MERGE_SEPARATOR: &str = "\n\n";

/// Turn a detection result into one unit per thread, singleton and repost
/// group.
pub fn consolidate(detection: Detection) -> Vec<ConsolidatedUnit> {
    let Detection {
        threads,
        singletons,
        reposts,
    } = detection;

    let mut units = Vec::with_capacity(threads.len() + singletons.len() + reposts.len());
    units.extend(threads.into_iter().map(merge_thread));
    units.extend(singletons.into_iter().map(single_unit));
    units.extend(reposts.into_iter().map(merge_reposts));

    debug!(units = units.len(), "consolidated units");
    units
}

/// Merge a self-thread into one unit.
///
/// Members keep chain order; the anchor is the root's timestamp.
pub fn merge_thread(thread: ThreadGroup) -> ConsolidatedUnit {
    let members = thread.members();
    let root = thread.root();

    ConsolidatedUnit {
        kind: UnitKind::Thread,
        uri: format!("{}{THREAD_URI_SUFFIX}", root.uri),
        author: root.author.clone(),
        anchor: root.created_at,
        text: join_texts(members.iter()),
        media_refs: members.iter().flat_map(record_media).collect(),
        member_uris: members.iter().map(|m| m.uri.clone()).collect(),
        original_uris: Vec::new(),
        reposted_by: None,
        reply_parent_uri: root.reply_parent_uri.clone(),
    }
}

/// Wrap a standalone post as a unit.
pub fn single_unit(record: PostRecord) -> ConsolidatedUnit {
    let text = record.rendered_text();
    let media_refs = record_media(&record).collect();

    ConsolidatedUnit {
        kind: UnitKind::Singleton,
        member_uris: vec![record.uri.clone()],
        uri: record.uri,
        author: record.author,
        anchor: record.created_at,
        text,
        media_refs,
        original_uris: Vec::new(),
        reposted_by: None,
        reply_parent_uri: record.reply_parent_uri,
    }
}

/// Merge a repost group into one unit attributed to the reposter.
///
/// The body is the merged text of the reposted chain; the anchor is the
/// repost time of the chain root.
pub fn merge_reposts(group: RepostGroup) -> ConsolidatedUnit {
    let wrappers = group.wrappers();
    let head = &wrappers[0];
    let root_target = head.repost_of.as_deref().unwrap_or(head);
    let targets: Vec<&PostRecord> = group.targets().collect();

    ConsolidatedUnit {
        kind: UnitKind::Repost,
        uri: head.uri.clone(),
        author: root_target.author.clone(),
        anchor: head.created_at,
        text: join_texts(targets.iter().copied()),
        media_refs: targets.iter().copied().flat_map(record_media).collect(),
        member_uris: wrappers.iter().map(|w| w.uri.clone()).collect(),
        original_uris: targets.iter().map(|t| t.uri.clone()).collect(),
        reposted_by: Some(group.reposter().clone()),
        reply_parent_uri: None,
    }
}

/// Rendered, trimmed, non-empty texts joined with [`MERGE_SEPARATOR`].
fn join_texts<'a>(records: impl Iterator<Item = &'a PostRecord>) -> String {
    records
        .map(PostRecord::rendered_text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join(MERGE_SEPARATOR)
}

/// A record's images followed by those of its quoted post.
fn record_media(record: &PostRecord) -> impl Iterator<Item = MediaRef> + '_ {
    record.media_refs.iter().cloned().chain(
        record
            .quoted_post
            .iter()
            .flat_map(|quoted| quoted.media_refs.iter().cloned()),
    )
}
