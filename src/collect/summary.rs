use crate::error::{FleetError, Result};
use crate::model::Summary;
use crate::process::{empty_tree_id, run_git};
use crate::util::ceil_days;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

static DIFF_TOTALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) .*, (\d+) .*").unwrap());

/// Whole-repository headline counts at the current head.
pub fn summary(workdir: &Path, repo: &str, timeout: Option<Duration>) -> Result<Summary> {
    let empty_tree = empty_tree_id(workdir, repo, timeout)?;
    let diff = run_git(
        workdir,
        repo,
        &["diff", "--shortstat", empty_tree.as_str()],
        timeout,
    )?;
    let (files, lines) = parse_diff_totals(&diff)?;

    let authors = run_git(workdir, repo, &["shortlog", "-s", "HEAD"], timeout)?
        .lines()
        .count() as u64;

    let commits = run_git(workdir, repo, &["rev-list", "--count", "HEAD"], timeout)?
        .parse()
        .map_err(|e| FleetError::Parse(format!("bad commit count for {repo}: {e}")))?;

    let branches = run_git(workdir, repo, &["branch", "-r"], timeout)?
        .lines()
        .filter(|line| !line.contains("HEAD"))
        .count() as u64;

    let first_commit = first_commit_timestamp(workdir, repo, timeout)?;
    let latest_commit: i64 = run_git(workdir, repo, &["log", "--pretty=format:%at", "-n1"], timeout)?
        .parse()
        .map_err(|e| FleetError::Parse(format!("bad head timestamp for {repo}: {e}")))?;

    // A repository without tags makes show-ref exit non-zero; that is a
    // normal state, not a failure.
    let tags = match run_git(workdir, repo, &["show-ref", "--tags"], timeout) {
        Ok(output) => output.lines().count() as u64,
        Err(e) => {
            debug!("no tags counted for {repo}: {e}");
            0
        }
    };

    Ok(Summary {
        files,
        lines,
        authors,
        commits,
        branches,
        tags,
        age_days: ceil_days(first_commit, latest_commit),
    })
}

pub fn first_commit_timestamp(
    workdir: &Path,
    repo: &str,
    timeout: Option<Duration>,
) -> Result<i64> {
    run_git(workdir, repo, &["log", "--reverse", "--pretty=format:%at"], timeout)?
        .lines()
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|e| FleetError::Parse(format!("bad first-commit timestamp for {repo}: {e}")))
}

/// Extract (files changed, lines) from a shortstat diff against the empty
/// tree; every change is an insertion there, so the second number is the
/// total line count.
fn parse_diff_totals(diff: &str) -> Result<(u64, u64)> {
    let caps = DIFF_TOTALS
        .captures(diff)
        .ok_or_else(|| FleetError::Parse(format!("unexpected diff shortstat: `{diff}`")))?;
    let files = caps[1].parse().unwrap_or(0);
    let lines = caps[2].parse().unwrap_or(0);
    Ok((files, lines))
}
