use crate::error::Result;
use crate::model::{AuthorTotals, BlameReport, FileAttribution};
use crate::pool::WorkerPool;
use crate::process::run_git;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: String,
    pub revision: String,
}

/// Every tracked path at HEAD with its blob identifier — the cache key for
/// blame staleness.
pub fn tracked_files(
    workdir: &Path,
    repo: &str,
    timeout: Option<Duration>,
) -> Result<Vec<TrackedFile>> {
    let listing = run_git(workdir, repo, &["ls-tree", "-r", "HEAD"], timeout)?;
    Ok(listing.lines().filter_map(parse_ls_tree_line).collect())
}

// ls-tree lines are `<mode> <type> <oid>\t<path>`; the path may contain
// spaces, so split on the tab first.
fn parse_ls_tree_line(line: &str) -> Option<TrackedFile> {
    let (meta, path) = line.split_once('\t')?;
    let revision = meta.split_whitespace().nth(2)?;
    Some(TrackedFile {
        path: path.to_string(),
        revision: revision.to_string(),
    })
}

/// Line-level attribution for one file: author -> line count. Failures
/// (binary content, path gone mid-run) degrade to an empty tally.
pub fn blame_file(
    workdir: &Path,
    repo: &str,
    detect_move: bool,
    path: &str,
    timeout: Option<Duration>,
) -> BTreeMap<String, u64> {
    let mut args = vec!["blame", "--line-porcelain"];
    if detect_move {
        args.extend_from_slice(&["-C", "-C", "-C", "-M"]);
    }
    args.extend_from_slice(&["-w", "--", path]);

    match run_git(workdir, repo, &args, timeout) {
        Ok(output) => parse_porcelain(&output),
        Err(e) => {
            debug!("blame degraded to empty for {repo}:{path}: {e}");
            BTreeMap::new()
        }
    }
}

fn parse_porcelain(output: &str) -> BTreeMap<String, u64> {
    let mut authors = BTreeMap::new();
    for line in output.lines() {
        if let Some(author) = line.strip_prefix("author ") {
            *authors.entry(author.to_string()).or_insert(0) += 1;
        }
    }
    authors
}

/// Merge the blame cache with fresh attributions for stale paths.
///
/// A cached entry is reused verbatim when its recorded blob identifier still
/// matches the tree entry; only the remaining paths are fanned out to
/// `blame`. Paths no longer tracked at HEAD drop out of the merged report.
pub fn merge_attributions<F>(
    tracked: &[TrackedFile],
    cache: &BlameReport,
    pool: &WorkerPool,
    blame: F,
) -> BlameReport
where
    F: Fn(&str) -> BTreeMap<String, u64> + Send + Sync,
{
    let mut merged = BlameReport::new();
    let mut stale: Vec<&TrackedFile> = Vec::new();

    for file in tracked {
        match cache.get(&file.path) {
            Some(entry) if entry.revision == file.revision => {
                merged.insert(file.path.clone(), entry.clone());
            }
            _ => stale.push(file),
        }
    }

    let fresh = pool.map(&stale, |file| {
        (
            file.path.clone(),
            FileAttribution {
                revision: file.revision.clone(),
                authors: blame(&file.path),
            },
        )
    });
    merged.extend(fresh);
    merged
}

/// Per-author totals over the full attribution map: lines across the tree
/// and the number of distinct files touched. Derived fresh each run, never
/// cached.
pub fn author_totals(report: &BlameReport) -> AuthorTotals {
    let mut totals = AuthorTotals::default();
    for attribution in report.values() {
        for (author, lines) in &attribution.authors {
            *totals.lines.entry(author.clone()).or_insert(0) += lines;
            *totals.files.entry(author.clone()).or_insert(0) += 1;
        }
    }
    totals
}
