use crate::error::{FleetError, Result};
use crate::model::TagAuthor;
use crate::process::run_git;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub tag: String,
    pub revision: String,
}

/// All tags with their target revisions. A repository without tags makes
/// show-ref exit non-zero, which is simply an empty list here.
pub fn tags(workdir: &Path, repo: &str, timeout: Option<Duration>) -> Vec<TagRef> {
    let output = match run_git(workdir, repo, &["show-ref", "--tags"], timeout) {
        Ok(output) => output,
        Err(e) => {
            debug!("no tags listed for {repo}: {e}");
            return Vec::new();
        }
    };
    output.lines().filter_map(parse_tag_line).collect()
}

fn parse_tag_line(line: &str) -> Option<TagRef> {
    let (revision, name) = line.trim().split_once(' ')?;
    Some(TagRef {
        tag: name.trim_start_matches("refs/tags/").to_string(),
        revision: revision.to_string(),
    })
}

/// Remote branch names, minus the symbolic HEAD alias.
pub fn branches(workdir: &Path, repo: &str, timeout: Option<Duration>) -> Result<Vec<String>> {
    Ok(run_git(workdir, repo, &["branch", "-r"], timeout)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("HEAD"))
        .map(str::to_string)
        .collect())
}

/// Commit timestamp of a single ref or revision.
pub fn timestamp(
    workdir: &Path,
    repo: &str,
    revision: &str,
    timeout: Option<Duration>,
) -> Result<i64> {
    run_git(
        workdir,
        repo,
        &["log", "--pretty=format:%at", "-n", "1", revision],
        timeout,
    )?
    .parse()
    .map_err(|e| FleetError::Parse(format!("bad timestamp for {repo}@{revision}: {e}")))
}

/// Per-author commit counts strictly between two revisions — everything
/// reachable from `newer` but not from `older`; the whole history when
/// `older` is absent (the oldest tag).
pub fn interval_authors(
    workdir: &Path,
    repo: &str,
    newer: &str,
    older: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Vec<TagAuthor>> {
    let exclusion = older.map(|older| format!("^{older}"));
    let mut args = vec!["shortlog", "-s", newer];
    if let Some(exclusion) = exclusion.as_deref() {
        args.push(exclusion);
    }
    parse_shortlog(&run_git(workdir, repo, &args, timeout)?)
}

fn parse_shortlog(output: &str) -> Result<Vec<TagAuthor>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (commits, author) = line
                .trim()
                .split_once('\t')
                .ok_or_else(|| FleetError::Parse(format!("unexpected shortlog line: `{line}`")))?;
            Ok(TagAuthor {
                author: author.to_string(),
                commits: commits
                    .trim()
                    .parse()
                    .map_err(|_| FleetError::Parse(format!("bad shortlog count: `{line}`")))?,
            })
        })
        .collect()
}
