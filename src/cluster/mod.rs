//! Similarity-based clustering of extracted error records.
//!
//! Messages are normalized (timestamps, identifiers, paths, addresses
//! stripped) for comparison only; the original message is retained as each
//! cluster's display representative. Clustering is greedy single-link per
//! type bucket, followed by an optional stricter cross-bucket merge.

pub mod similarity;

pub use similarity::{edit_distance, similarity};

use crate::extract::{ErrorRecord, ErrorType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Minimum normalized-key similarity for a record to join a cluster.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Stricter similarity required to merge clusters across type buckets.
pub const DEFAULT_MERGE_THRESHOLD: f64 = 0.85;

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("invalid pattern")
});
static UUID_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("invalid pattern")
});
static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("invalid pattern"));
static ABSOLUTE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/[\w.@+-]+){2,}/([\w.@+-]+)").expect("invalid pattern"));
static LINE_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+:\d+\b").expect("invalid pattern"));
static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("invalid pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid pattern"));

/// Options for [`cluster`].
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Similarity threshold for attaching a record to a cluster seed.
    pub threshold: f64,
    /// Bucket records by error type before clustering.
    pub group_by_type: bool,
    /// Threshold for the cross-bucket merge pass.
    pub merge_threshold: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            group_by_type: true,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }
}

/// A group of near-duplicate error records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCluster {
    /// Error types present in this cluster. Starts with one element; the
    /// cross-bucket merge appends further kinds, first entry dominant.
    pub kinds: Vec<ErrorType>,

    /// Original message of the seed record, kept for display.
    pub representative: String,

    /// Normalized form of the representative, used for comparison.
    pub normalized_key: String,

    /// Number of records in the cluster (`== errors.len()`).
    pub count: usize,

    /// The member records.
    pub errors: Vec<ErrorRecord>,

    /// Run identifiers observed across members.
    pub runs: BTreeSet<String>,

    /// Source paths/labels observed across members.
    pub sources: BTreeSet<String>,
}

impl ErrorCluster {
    fn seed(record: ErrorRecord) -> Self {
        let normalized_key = normalize_message(&record.message);
        let mut cluster = Self {
            kinds: vec![record.kind],
            representative: record.message.clone(),
            normalized_key,
            count: 0,
            errors: Vec::new(),
            runs: BTreeSet::new(),
            sources: BTreeSet::new(),
        };
        cluster.attach(record);
        cluster
    }

    fn attach(&mut self, record: ErrorRecord) {
        if let Some(run_id) = &record.run_id {
            self.runs.insert(run_id.clone());
        }
        self.sources.insert(record.source.clone());
        self.errors.push(record);
        self.count = self.errors.len();
    }

    /// Merge another cluster into this one, unioning members and metadata.
    fn absorb(&mut self, other: ErrorCluster) {
        for kind in other.kinds {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
        self.runs.extend(other.runs);
        self.sources.extend(other.sources);
        self.errors.extend(other.errors);
        self.count = self.errors.len();
    }

    /// The dominant (seed) error type.
    pub fn dominant_kind(&self) -> ErrorType {
        self.kinds[0]
    }

    /// Display label: single type name, or slash-joined for merged clusters.
    pub fn kind_label(&self) -> String {
        self.kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Normalize a message for similarity comparison.
///
/// Strips timestamps, UUIDs, hex addresses; reduces absolute paths to
/// `.../filename` and `:line:col` to `:N:N`; replaces digit runs with `N`;
/// collapses whitespace; lowercases. Display text is never normalized.
pub fn normalize_message(message: &str) -> String {
    let mut text = message.to_string();
    text = TIMESTAMP.replace_all(&text, " ").into_owned();
    text = UUID_LITERAL.replace_all(&text, "U").into_owned();
    text = HEX_ADDRESS.replace_all(&text, "0xN").into_owned();
    text = ABSOLUTE_PATH.replace_all(&text, ".../$1").into_owned();
    text = LINE_COL.replace_all(&text, ":N:N").into_owned();
    text = NUMBER_RUN.replace_all(&text, "N").into_owned();
    text = WHITESPACE.replace_all(&text, " ").into_owned();
    text.trim().to_lowercase()
}

/// Cluster error records by normalized-message similarity.
///
/// Greedy single-link within each type bucket: the first unassigned record
/// seeds a cluster, every later record within `threshold` of the seed is
/// attached, repeat until all records are assigned. O(n²) per bucket; n is
/// bounded by the extractor's cap. Output is sorted by count descending.
pub fn cluster(records: &[ErrorRecord], opts: &ClusterOptions) -> Vec<ErrorCluster> {
    let mut buckets: BTreeMap<Option<ErrorType>, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in records {
        let key = if opts.group_by_type {
            Some(record.kind)
        } else {
            None
        };
        buckets.entry(key).or_default().push(record);
    }

    let mut clusters = Vec::new();
    for bucket in buckets.values() {
        let mut assigned = vec![false; bucket.len()];
        for i in 0..bucket.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let mut current = ErrorCluster::seed(bucket[i].clone());
            for j in (i + 1)..bucket.len() {
                if assigned[j] {
                    continue;
                }
                let key = normalize_message(&bucket[j].message);
                if similarity(&current.normalized_key, &key) >= opts.threshold {
                    assigned[j] = true;
                    current.attach(bucket[j].clone());
                }
            }
            clusters.push(current);
        }
    }

    if opts.group_by_type {
        clusters = merge_clusters(clusters, opts.merge_threshold);
    }

    clusters.sort_by(|a, b| b.count.cmp(&a.count));
    clusters
}

/// Merge clusters across type buckets whose normalized keys meet the
/// stricter merge threshold.
fn merge_clusters(clusters: Vec<ErrorCluster>, merge_threshold: f64) -> Vec<ErrorCluster> {
    let mut merged: Vec<ErrorCluster> = Vec::new();
    for candidate in clusters {
        let target = merged.iter_mut().find(|existing| {
            similarity(&existing.normalized_key, &candidate.normalized_key) >= merge_threshold
        });
        match target {
            Some(existing) => existing.absorb(candidate),
            None => merged.push(candidate),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, extract};

    fn record(kind: ErrorType, message: &str) -> ErrorRecord {
        ErrorRecord {
            kind,
            message: message.to_string(),
            full_match: message.to_string(),
            location: None,
            line: None,
            source: "test".to_string(),
            run_id: None,
            iteration: None,
            agent: None,
        }
    }

    fn record_in_run(kind: ErrorType, message: &str, run_id: &str) -> ErrorRecord {
        ErrorRecord {
            run_id: Some(run_id.to_string()),
            ..record(kind, message)
        }
    }

    #[test]
    fn test_normalize_strips_noise() {
        let a = normalize_message("ENOENT at /home/user/project/src/app.js:10:4");
        let b = normalize_message("ENOENT at /tmp/other/checkout/src/app.js:99:1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_keeps_words() {
        let key = normalize_message("Cannot find module 'lodash'");
        assert!(key.contains("cannot find module"));
        assert!(key.contains("lodash"));
    }

    #[test]
    fn test_cluster_groups_near_duplicates() {
        let records = vec![
            record_in_run(ErrorType::MissingDependency, "Cannot find module 'lodash'", "r1"),
            record_in_run(ErrorType::MissingDependency, "Cannot find module 'lodash'", "r2"),
            record_in_run(ErrorType::MissingDependency, "Cannot find module 'lodash'", "r3"),
            record(ErrorType::TestFailure, "AssertionError: expected 2 to equal 3"),
        ];
        let clusters = cluster(&records, &ClusterOptions::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 3);
        assert_eq!(clusters[0].dominant_kind(), ErrorType::MissingDependency);
        assert_eq!(clusters[0].runs.len(), 3);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_cluster_sorted_by_count_descending() {
        let mut records = vec![record(ErrorType::GitError, "fatal: not a git repository")];
        for _ in 0..4 {
            records.push(record(ErrorType::TimeoutError, "command timed out after 60s"));
        }
        let clusters = cluster(&records, &ClusterOptions::default());
        assert!(clusters.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(clusters[0].count, 4);
    }

    #[test]
    fn test_cluster_order_independent_sizes() {
        let base = vec![
            record(ErrorType::TypeError, "TypeError: a is undefined"),
            record(ErrorType::TypeError, "TypeError: a is undefined"),
            record(ErrorType::NetworkError, "connect ECONNREFUSED 127.0.0.1:5432"),
            record(ErrorType::NetworkError, "connect ECONNREFUSED 127.0.0.1:6379"),
            record(ErrorType::MemoryError, "JavaScript heap out of memory"),
        ];
        let mut reversed = base.clone();
        reversed.reverse();

        let mut sizes_a: Vec<usize> = cluster(&base, &ClusterOptions::default())
            .iter()
            .map(|c| c.count)
            .collect();
        let mut sizes_b: Vec<usize> = cluster(&reversed, &ClusterOptions::default())
            .iter()
            .map(|c| c.count)
            .collect();
        sizes_a.sort_unstable();
        sizes_b.sort_unstable();
        assert_eq!(sizes_a, sizes_b);
    }

    #[test]
    fn test_merge_across_types() {
        // Same underlying text matched by two categories ends up as one
        // merged cluster with a slash label.
        let records = vec![
            record(ErrorType::MemoryError, "webpack build failed: out of memory"),
            record(ErrorType::BuildError, "webpack build failed: out of memory"),
        ];
        let clusters = cluster(&records, &ClusterOptions::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].kind_label(), "memory_error/build_error");
    }

    #[test]
    fn test_threshold_zero_groups_everything_in_bucket() {
        let records = vec![
            record(ErrorType::GitError, "fatal: bad revision 'HEAD~3'"),
            record(ErrorType::GitError, "Merge conflict in src/lib.rs"),
        ];
        let opts = ClusterOptions {
            threshold: 0.0,
            ..Default::default()
        };
        let clusters = cluster(&records, &opts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
    }

    #[test]
    fn test_extract_then_cluster_pipeline() {
        let text = "\
[10:00] Error: Cannot find module 'lodash'
[10:05] Error: Cannot find module 'lodash'
[10:09] TypeError: undefined is not a function
";
        let records = extract(text, &ExtractOptions::default());
        let clusters = cluster(&records, &ClusterOptions::default());
        assert!(!clusters.is_empty());
        assert!(
            clusters
                .iter()
                .any(|c| c.dominant_kind() == ErrorType::MissingDependency)
        );
    }
}
