use crate::config::{Config, RepoConfig};
use crate::error::{FleetError, Result};
use crate::model::RepoState;
use crate::pool::WorkerPool;
use crate::process::{run, run_git};
use crate::store::DataStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

pub struct SyncOutcome {
    /// Prior state overlaid with this run's successful updates; repositories
    /// that failed to sync keep their last-known-good entry.
    pub states: BTreeMap<String, RepoState>,
    /// Names needing recomputation this run.
    pub dirty: Vec<String>,
}

/// Bring every configured working copy up to date and decide which
/// repositories changed since the previous run. A failed repository is
/// logged and left out of the dirty set; it does not stop the run unless
/// `fail_fast` is configured.
pub fn sync_repos(
    config: &Config,
    pool: &WorkerPool,
    store: &DataStore,
    force: bool,
) -> Result<SyncOutcome> {
    let prior = store.load_repo_states();
    let repos_dir = config.repos_dir();
    std::fs::create_dir_all(&repos_dir)?;
    let timeout = config.command_timeout();

    let bar = ProgressBar::new(config.repositories.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} updating repositories {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let results = pool.map(&config.repositories, |repo| {
        let state = update_repo(&repos_dir, repo, timeout);
        bar.inc(1);
        match state {
            Ok(state) => {
                info!("{} updated", state.name);
                Some(state)
            }
            Err(e) => {
                error!("sync failed for {}: {e}", repo.name);
                None
            }
        }
    });
    bar.finish_and_clear();

    let failed = results.iter().filter(|r| r.is_none()).count();
    if config.fail_fast && failed > 0 {
        return Err(FleetError::Sync(format!(
            "{failed} repositories failed to sync and fail_fast is set"
        )));
    }

    let current: BTreeMap<String, RepoState> = results
        .into_iter()
        .flatten()
        .map(|state| (state.name.clone(), state))
        .collect();

    Ok(merge_states(prior, current, force))
}

/// Overlay the fresh states onto the prior map and derive the dirty set:
/// every repository whose head moved, every repository never seen before,
/// or everything when forced.
pub fn merge_states(
    prior: BTreeMap<String, RepoState>,
    current: BTreeMap<String, RepoState>,
    force: bool,
) -> SyncOutcome {
    let mut dirty: Vec<String> = current
        .values()
        .filter(|state| {
            prior
                .get(&state.name)
                .map(|previous| previous.head != state.head)
                .unwrap_or(true)
        })
        .map(|state| state.name.clone())
        .collect();

    let mut states = prior;
    states.extend(current);

    if force {
        dirty = states.keys().cloned().collect();
    }

    SyncOutcome { states, dirty }
}

fn update_repo(repos_dir: &Path, repo: &RepoConfig, timeout: Option<Duration>) -> Result<RepoState> {
    // Clone failures are ignored; the checkout normally exists already and
    // the pull below surfaces anything real.
    let _ = run(
        "git",
        &["clone", repo.clone.as_str(), repo.name.as_str()],
        repos_dir,
        timeout,
    );
    run_git(repos_dir, &repo.name, &["pull", "--tags"], timeout)?;

    let head_line = run_git(
        repos_dir,
        &repo.name,
        &["log", "--pretty=format:%H %at %aN", "-n1"],
        timeout,
    )?;
    let mut parts = head_line.splitn(3, ' ');
    let (Some(head), Some(timestamp), Some(author)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FleetError::Parse(format!(
            "unexpected head description for {}: `{head_line}`",
            repo.name
        )));
    };
    let timestamp = timestamp.parse().map_err(|_| {
        FleetError::Parse(format!("bad head timestamp for {}: `{head_line}`", repo.name))
    })?;
    let first_commit =
        crate::collect::summary::first_commit_timestamp(repos_dir, &repo.name, timeout)?;

    Ok(RepoState {
        name: repo.name.clone(),
        head: head.to_string(),
        timestamp,
        author: author.to_string(),
        first_commit,
    })
}
