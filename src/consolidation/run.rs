//! End-to-end consolidation of one batch.

use tracing::info;

use super::algorithm::find_self_threads;
use super::filter::{dedupe_records, filter_units, FilterOptions};
use super::merge::consolidate;
use super::types::{ConsolidatedUnit, PostRecord};

/// Counts gathered while consolidating a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Records received
    pub input: usize,
    /// Records dropped as duplicate uris
    pub duplicates: usize,
    /// Self-threads detected
    pub threads: usize,
    /// Standalone posts
    pub singletons: usize,
    /// Repost groups
    pub repost_groups: usize,
    /// Units dropped by the filters
    pub filtered_out: usize,
}

/// Output of [`run_with_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    /// Final ordered units
    pub units: Vec<ConsolidatedUnit>,
    /// Stage counts
    pub stats: RunStats,
}

/// Consolidate a batch into the final ordered unit list.
///
/// Pure and deterministic: the same batch and options always produce the
/// same output, whatever the input order.
pub fn run(records: Vec<PostRecord>, options: &FilterOptions) -> Vec<ConsolidatedUnit> {
    run_with_stats(records, options).units
}

/// Like [`run`], also reporting per-stage counts.
pub fn run_with_stats(records: Vec<PostRecord>, options: &FilterOptions) -> Consolidation {
    let input = records.len();
    let records = dedupe_records(records);
    let duplicates = input - records.len();

    let detection = find_self_threads(records);
    let threads = detection.threads.len();
    let singletons = detection.singletons.len();
    let repost_groups = detection.reposts.len();

    let merged = consolidate(detection);
    let merged_count = merged.len();
    let units = filter_units(merged, options);

    let stats = RunStats {
        input,
        duplicates,
        threads,
        singletons,
        repost_groups,
        filtered_out: merged_count - units.len(),
    };

    info!(
        input = stats.input,
        duplicates = stats.duplicates,
        threads = stats.threads,
        singletons = stats.singletons,
        repost_groups = stats.repost_groups,
        units = units.len(),
        "consolidated batch"
    );

    Consolidation { units, stats }
}
