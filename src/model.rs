use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Head state of one configured repository, persisted in `repos.json`.
///
/// `head` identifies the working tree every collector in a run operates on;
/// a change in `head` between runs is what marks a repository dirty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    pub name: String,
    pub head: String,
    pub timestamp: i64,
    pub author: String,
    pub first_commit: i64,
}

/// A (tree identifier, commit timestamp) pair observed in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub files: u64,
    pub lines: u64,
    pub authors: u64,
    pub commits: u64,
    pub branches: u64,
    pub tags: u64,
    pub age_days: i64,
}

/// One bucket of activity counters. Buckets are additive: folding commit
/// records in any order produces the same totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub commits: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl Bucket {
    pub fn add(&mut self, other: Bucket) {
        self.commits += other.commits;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

/// The five time-dimension bucketings, keyed by bucket label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBuckets {
    pub yearly: BTreeMap<String, Bucket>,
    pub monthly: BTreeMap<String, Bucket>,
    pub daily: BTreeMap<String, Bucket>,
    pub weekly: BTreeMap<String, Bucket>,
    pub at_hour: BTreeMap<String, Bucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorAge {
    pub first_commit: i64,
    pub last_commit: i64,
    pub days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub by_time: TimeBuckets,
    /// weekday (0 = Monday) -> hour -> commit count
    pub hour_of_week: BTreeMap<String, BTreeMap<String, u64>>,
    pub by_authors: BTreeMap<String, TimeBuckets>,
    pub authors_age: BTreeMap<String, AuthorAge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAuthor {
    pub author: String,
    pub commits: u64,
}

/// A tag plus the author distribution strictly between it and the
/// next-older tag. `tags.json` holds these newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag: String,
    pub revision: String,
    pub timestamp: i64,
    pub authors: Vec<TagAuthor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
    pub timestamp: i64,
}

/// Tracked-file count at one revision, keyed by revision in `files-history.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCount {
    pub timestamp: i64,
    pub files: u64,
}

pub type FilesHistory = BTreeMap<String, FileCount>;

/// Blame cache entry: the tally stays valid while `revision` (the blob
/// identifier of the tree entry) is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttribution {
    pub revision: String,
    pub authors: BTreeMap<String, u64>,
}

/// path -> attribution, persisted as `files-authors.json`.
pub type BlameReport = BTreeMap<String, FileAttribution>;

/// Derived per-author totals, recomputed from the full blame report each run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorTotals {
    pub lines: BTreeMap<String, u64>,
    pub files: BTreeMap<String, u64>,
}

/// Raw line-count output from the external counting tool, kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinesReport {
    pub lines: serde_json::Value,
}

impl Default for LinesReport {
    fn default() -> Self {
        Self {
            lines: serde_json::Value::Array(Vec::new()),
        }
    }
}
