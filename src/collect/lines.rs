use crate::model::LinesReport;
use crate::process::run;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Per-language line counts from the external counting tool, in JSON mode
/// over the repository's tracked files. Any failure — tool missing, bad
/// exit, unparseable output — degrades to an empty fragment; a fleet run
/// never fails because one checkout cannot be counted.
pub fn count_lines(workdir: &Path, repo: &str, timeout: Option<Duration>) -> LinesReport {
    let output = match run("cloc", &["--vcs", "git", "--json"], &workdir.join(repo), timeout) {
        Ok(output) => output,
        Err(e) => {
            warn!("line count failed for {repo}: {e}");
            return LinesReport::default();
        }
    };
    match serde_json::from_str(&output) {
        Ok(value) => LinesReport { lines: value },
        Err(e) => {
            warn!("unparseable line count output for {repo}: {e}");
            LinesReport::default()
        }
    }
}
