use crate::error::{FleetError, Result};
use crate::model::{ActivityReport, Bucket, Revision, TimeBuckets};
use crate::process::run_git;
use crate::util::{ceil_days, day_key, hour_key, month_key, week_key, year_key};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;

static SHORTSTAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+ files? changed,").unwrap());
static INSERTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r" (\d+) insert").unwrap());
static DELETIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r" (\d+) delet").unwrap());

pub struct ActivityOutcome {
    pub report: ActivityReport,
    /// (tree identifier, timestamp) pairs in log order, newest first; the
    /// work list for the file-history phase.
    pub revisions: Vec<Revision>,
}

/// Full-history activity aggregation for one repository.
///
/// The log interleaves one header line per commit (`timestamp tree author`)
/// with an optional shortstat line; a commit that changed no files has no
/// shortstat line and counts only toward `commits`.
pub fn activity(workdir: &Path, repo: &str, timeout: Option<Duration>) -> Result<ActivityOutcome> {
    let log = run_git(
        workdir,
        repo,
        &["log", "--shortstat", "--pretty=format:%at %T %aN", "HEAD"],
        timeout,
    )?;
    parse_activity(&log)
}

fn parse_activity(log: &str) -> Result<ActivityOutcome> {
    let mut report = ActivityReport::default();
    let mut revisions = Vec::new();
    // A shortstat line belongs to the most recent header line.
    let mut context: Option<(DateTime<Utc>, String)> = None;

    for line in log.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if SHORTSTAT.is_match(line) {
            let (when, author) = context.clone().ok_or_else(|| {
                FleetError::Parse(format!("shortstat before any commit header: `{line}`"))
            })?;
            let delta = Bucket {
                commits: 0,
                insertions: capture_count(&INSERTIONS, line),
                deletions: capture_count(&DELETIONS, line),
            };
            fold(&mut report, &when, &author, delta);
        } else {
            let (timestamp, revision, author) = parse_header(line)?;
            let when = Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| {
                FleetError::Parse(format!("timestamp out of range: {timestamp}"))
            })?;
            revisions.push(Revision {
                revision: revision.to_string(),
                timestamp,
            });

            let weekday = format!("{}", when.weekday().num_days_from_monday());
            *report
                .hour_of_week
                .entry(weekday)
                .or_default()
                .entry(hour_key(&when))
                .or_insert(0) += 1;

            let age = report.authors_age.entry(author.to_string()).or_default();
            if age.first_commit == 0 || age.first_commit > timestamp {
                age.first_commit = timestamp;
            }
            if age.last_commit < timestamp {
                age.last_commit = timestamp;
            }

            fold(
                &mut report,
                &when,
                author,
                Bucket {
                    commits: 1,
                    insertions: 0,
                    deletions: 0,
                },
            );
            context = Some((when, author.to_string()));
        }
    }

    for age in report.authors_age.values_mut() {
        age.days = ceil_days(age.first_commit, age.last_commit);
    }

    Ok(ActivityOutcome { report, revisions })
}

fn parse_header(line: &str) -> Result<(i64, &str, &str)> {
    let mut parts = line.splitn(3, ' ');
    let (Some(timestamp), Some(revision), Some(author)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(FleetError::Parse(format!("malformed log header: `{line}`")));
    };
    let timestamp = timestamp
        .parse()
        .map_err(|_| FleetError::Parse(format!("bad timestamp in log header: `{line}`")))?;
    Ok((timestamp, revision, author))
}

fn capture_count(re: &Regex, line: &str) -> u64 {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn fold(report: &mut ActivityReport, when: &DateTime<Utc>, author: &str, delta: Bucket) {
    add_to_buckets(&mut report.by_time, when, delta);
    add_to_buckets(
        report.by_authors.entry(author.to_string()).or_default(),
        when,
        delta,
    );
}

fn add_to_buckets(buckets: &mut TimeBuckets, when: &DateTime<Utc>, delta: Bucket) {
    buckets.yearly.entry(year_key(when)).or_default().add(delta);
    buckets.monthly.entry(month_key(when)).or_default().add(delta);
    buckets.daily.entry(day_key(when)).or_default().add(delta);
    buckets.weekly.entry(week_key(when)).or_default().add(delta);
    buckets.at_hour.entry(hour_key(when)).or_default().add(delta);
}
