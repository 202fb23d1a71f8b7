//! Self-thread detection algorithm.
//!
//! This module groups a flat batch of post records into same-author reply
//! chains. Reply pointers may reference posts outside the batch; such links
//! are simply not followed, so a gap in the batch ends a chain.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::types::{Detection, PostRecord, RepostGroup, ThreadGroup};

/// Partition a batch into self-threads, singletons and repost groups.
///
/// Steps:
/// 1. Splits repost wrappers from original posts
/// 2. Links each post to its in-batch, same-author reply parent
/// 3. Picks one successor per parent (earliest reply, then smallest uri)
/// 4. Walks chains from their heads, breaking cycles at the smallest uri
/// 5. Groups each reposter's wrappers by the chains their targets form
///
/// The output does not depend on input order. Every input record lands in
/// exactly one of the three lists.
pub fn find_self_threads(records: Vec<PostRecord>) -> Detection {
    let (reposts, posts): (Vec<PostRecord>, Vec<PostRecord>) =
        records.into_iter().partition(PostRecord::is_repost);

    let mut detection = Detection::default();

    for mut chain in build_chains(posts, |record| record) {
        if chain.len() == 1 {
            detection.singletons.extend(chain.pop());
        } else if let Some(thread) = ThreadGroup::new(chain) {
            detection.threads.push(thread);
        }
    }

    detection.reposts = group_reposts(reposts);

    debug!(
        threads = detection.threads.len(),
        singletons = detection.singletons.len(),
        repost_groups = detection.reposts.len(),
        "self-thread detection complete"
    );

    detection
}

/// Group repost wrappers by reposter, then by the chains their targets form.
///
/// A reposter who reposted several posts of one self-thread gets a single
/// group; unrelated reposts each get a group of their own.
pub fn group_reposts(wrappers: Vec<PostRecord>) -> Vec<RepostGroup> {
    let mut by_reposter: BTreeMap<String, Vec<PostRecord>> = BTreeMap::new();
    for wrapper in wrappers {
        by_reposter
            .entry(wrapper.author_id().to_string())
            .or_default()
            .push(wrapper);
    }

    by_reposter
        .into_values()
        .flat_map(|wrappers| build_chains(wrappers, repost_target))
        .filter_map(RepostGroup::new)
        .collect()
}

/// The record whose reply edge a repost wrapper follows: its target.
fn repost_target(wrapper: &PostRecord) -> &PostRecord {
    wrapper.repost_of.as_deref().unwrap_or(wrapper)
}

/// Split `items` into same-author reply chains, root first.
///
/// `node` maps an item to the record whose `uri`, `reply_parent_uri`,
/// author and timestamp define the chain structure. Chains are returned in
/// order of their root's node uri; items that chain with nothing come back
/// as chains of one.
fn build_chains<F>(mut items: Vec<PostRecord>, node: F) -> Vec<Vec<PostRecord>>
where
    F: Fn(&PostRecord) -> &PostRecord,
{
    // Index order is uri order, so every tie below resolves by uri
    items.sort_by(|a, b| {
        node(a)
            .uri
            .cmp(&node(b).uri)
            .then_with(|| a.uri.cmp(&b.uri))
    });

    let chains = chain_indices(&items, &node);

    let mut slots: Vec<Option<PostRecord>> = items.into_iter().map(Some).collect();
    chains
        .into_iter()
        .map(|chain| {
            chain
                .into_iter()
                .filter_map(|index| slots[index].take())
                .collect()
        })
        .collect()
}

/// Compute chains as index lists over `items` (already sorted by node uri).
fn chain_indices<F>(items: &[PostRecord], node: &F) -> Vec<Vec<usize>>
where
    F: Fn(&PostRecord) -> &PostRecord,
{
    let count = items.len();

    // uri -> index; duplicates keep the first (smallest) index
    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(count);
    for (index, item) in items.iter().enumerate() {
        lookup.entry(node(item).uri.as_str()).or_insert(index);
    }

    // parent index -> qualifying child indices
    let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let record = node(item);
        let Some(parent_uri) = record.reply_parent_uri.as_deref() else {
            continue;
        };
        let Some(&parent) = lookup.get(parent_uri) else {
            continue;
        };
        if parent == index || node(&items[parent]).author_id() != record.author_id() {
            continue;
        }
        children.entry(parent).or_default().push(index);
    }

    // One successor per parent: the earliest reply continues the chain
    let mut successor: Vec<Option<usize>> = vec![None; count];
    let mut is_successor = vec![false; count];
    for (parent, replies) in &children {
        let chosen = replies.iter().copied().min_by(|&a, &b| {
            let (ra, rb) = (node(&items[a]), node(&items[b]));
            ra.created_at
                .cmp(&rb.created_at)
                .then_with(|| ra.uri.cmp(&rb.uri))
                .then_with(|| a.cmp(&b))
        });
        if let Some(child) = chosen {
            successor[*parent] = Some(child);
            is_successor[child] = true;
        }
    }

    let mut visited = vec![false; count];
    let mut chains = Vec::new();

    let walk = |start: usize, visited: &mut Vec<bool>| -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if visited[index] {
                break;
            }
            visited[index] = true;
            chain.push(index);
            current = successor[index];
        }
        chain
    };

    for head in (0..count).filter(|&i| !is_successor[i]) {
        chains.push(walk(head, &mut visited));
    }

    // Anything left sits on a reply cycle; break it at the smallest uri
    for start in 0..count {
        if !visited[start] {
            debug!(uri = %node(&items[start]).uri, "breaking reply cycle");
            chains.push(walk(start, &mut visited));
        }
    }

    chains.sort_by_key(|chain| chain[0]);
    chains
}
