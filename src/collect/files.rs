use crate::error::Result;
use crate::model::{FileCount, FilesHistory, Revision};
use crate::process::run_git;
use std::path::Path;
use std::time::Duration;

/// Tracked-path count at one revision, as a ready-to-merge history entry.
pub fn num_files(
    workdir: &Path,
    repo: &str,
    revision: &Revision,
    timeout: Option<Duration>,
) -> Result<(String, FileCount)> {
    let listing = run_git(
        workdir,
        repo,
        &["ls-tree", "-r", "--name-only", revision.revision.as_str()],
        timeout,
    )?;
    Ok((
        revision.revision.clone(),
        FileCount {
            timestamp: revision.timestamp,
            files: listing.lines().count() as u64,
        },
    ))
}

/// Revisions not yet present in the cached history. The hit test is
/// "identifier already present as a cache key", so entries are only ever
/// added, never invalidated.
pub fn missing_revisions(history: &FilesHistory, revisions: &[Revision]) -> Vec<Revision> {
    revisions
        .iter()
        .filter(|rev| !history.contains_key(&rev.revision))
        .cloned()
        .collect()
}
