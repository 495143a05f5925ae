use crate::collect;
use crate::config::Config;
use crate::error::Result;
use crate::model::{BlameReport, BranchRecord, FilesHistory, Revision, TagRecord};
use crate::pool::WorkerPool;
use crate::store::DataStore;
use crate::sync;
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// One full statistics run over the fleet.
///
/// Phases run strictly in sequence; each phase fans its repositories (or
/// files, or revisions) out over the worker pool and fully drains before the
/// next phase starts. Only the orchestrator writes to the store, and only
/// after a drain, so reports never see a partial phase. Every phase after
/// repository sync works exclusively on the dirty set.
pub fn run(config: &Config, force: bool) -> anyhow::Result<()> {
    let store = DataStore::new(config.data_dir()).context("Failed to open the data store")?;
    let pool = WorkerPool::new(config.pool_size).context("Failed to build the worker pool")?;

    let pipeline = Pipeline {
        repos_dir: config.repos_dir(),
        timeout: config.command_timeout(),
        store,
        pool,
    };

    info!(
        "running over {} repositories with {} workers",
        config.repositories.len(),
        pipeline.pool.workers()
    );

    let outcome =
        sync::sync_repos(config, &pipeline.pool, &pipeline.store, force).context("Repository sync failed")?;
    pipeline
        .store
        .save_repo_states(&outcome.states)
        .context("Failed to persist repository states")?;
    let dirty = outcome.dirty;
    info!("{} of {} repositories dirty", dirty.len(), outcome.states.len());

    pipeline.summarize(&dirty)?;
    pipeline.count_lines(&dirty)?;
    let revisions = pipeline.activity(&dirty)?;
    pipeline.files_history(&revisions)?;
    pipeline.tags(&dirty)?;
    pipeline.branches(&dirty)?;
    pipeline.blame(config, &dirty)?;

    pipeline
        .store
        .save_last_update(Utc::now().timestamp())
        .context("Failed to stamp the run")?;
    info!("run complete");
    Ok(())
}

struct Pipeline {
    repos_dir: PathBuf,
    timeout: Option<Duration>,
    store: DataStore,
    pool: WorkerPool,
}

impl Pipeline {
    fn summarize(&self, dirty: &[String]) -> Result<()> {
        let results = self.pool.map(dirty, |repo| {
            match collect::summary(&self.repos_dir, repo, self.timeout) {
                Ok(summary) => Some((repo.clone(), summary)),
                Err(e) => {
                    error!("summary failed for {repo}: {e}");
                    None
                }
            }
        });
        for (repo, summary) in results.into_iter().flatten() {
            self.store.save(&repo, "summary", &summary)?;
            info!("{repo} summary updated");
        }
        Ok(())
    }

    fn count_lines(&self, dirty: &[String]) -> Result<()> {
        let results = self.pool.map(dirty, |repo| {
            (
                repo.clone(),
                collect::count_lines(&self.repos_dir, repo, self.timeout),
            )
        });
        for (repo, lines) in results {
            self.store.save(&repo, "lines", &lines)?;
            info!("{repo} lines updated");
        }
        Ok(())
    }

    fn activity(&self, dirty: &[String]) -> Result<Vec<(String, Vec<Revision>)>> {
        let results = self.pool.map(dirty, |repo| {
            match collect::activity(&self.repos_dir, repo, self.timeout) {
                Ok(outcome) => Some((repo.clone(), outcome)),
                Err(e) => {
                    error!("activity failed for {repo}: {e}");
                    None
                }
            }
        });
        let mut revisions = Vec::new();
        for (repo, outcome) in results.into_iter().flatten() {
            self.store.save(&repo, "activity", &outcome.report)?;
            info!("{repo} activity updated");
            revisions.push((repo, outcome.revisions));
        }
        Ok(revisions)
    }

    /// Extend each repository's revision -> file-count history with the
    /// revisions this run observed for the first time. Existing entries are
    /// reused untouched; the history only ever grows.
    fn files_history(&self, revisions: &[(String, Vec<Revision>)]) -> Result<()> {
        for (repo, revs) in revisions {
            let mut history: FilesHistory =
                self.store.load(repo, "files-history").unwrap_or_default();
            let missing = collect::missing_revisions(&history, revs);
            let counted = self.pool.map(&missing, |rev| {
                match collect::num_files(&self.repos_dir, repo, rev, self.timeout) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        error!("file count failed for {repo}@{}: {e}", rev.revision);
                        None
                    }
                }
            });
            history.extend(counted.into_iter().flatten());
            self.store.save(repo, "files-history", &history)?;
            info!("{repo} files history updated");
        }
        Ok(())
    }

    fn tags(&self, dirty: &[String]) -> Result<()> {
        for repo in dirty {
            let tags = collect::tags(&self.repos_dir, repo, self.timeout);
            let stamped = self.pool.map(&tags, |tag| {
                match collect::timestamp(&self.repos_dir, repo, &tag.revision, self.timeout) {
                    Ok(timestamp) => Some((tag.clone(), timestamp)),
                    Err(e) => {
                        error!("timestamp failed for {repo} tag {}: {e}", tag.tag);
                        None
                    }
                }
            });
            let mut stamped: Vec<_> = stamped.into_iter().flatten().collect();
            stamped.sort_by(|a, b| b.1.cmp(&a.1));

            let mut records = Vec::with_capacity(stamped.len());
            for (index, (tag, timestamp)) in stamped.iter().enumerate() {
                let older = stamped.get(index + 1).map(|(t, _)| t.revision.as_str());
                let authors = match collect::interval_authors(
                    &self.repos_dir,
                    repo,
                    &tag.revision,
                    older,
                    self.timeout,
                ) {
                    Ok(authors) => authors,
                    Err(e) => {
                        error!("shortlog failed for {repo} tag {}: {e}", tag.tag);
                        Vec::new()
                    }
                };
                records.push(TagRecord {
                    tag: tag.tag.clone(),
                    revision: tag.revision.clone(),
                    timestamp: *timestamp,
                    authors,
                });
            }
            self.store.save(repo, "tags", &records)?;
            info!("{repo} tags updated");
        }
        Ok(())
    }

    fn branches(&self, dirty: &[String]) -> Result<()> {
        for repo in dirty {
            let branches = match collect::branches(&self.repos_dir, repo, self.timeout) {
                Ok(branches) => branches,
                Err(e) => {
                    error!("branch listing failed for {repo}: {e}");
                    continue;
                }
            };
            let stamped = self.pool.map(&branches, |name| {
                match collect::timestamp(&self.repos_dir, repo, name, self.timeout) {
                    Ok(timestamp) => Some(BranchRecord {
                        name: name.clone(),
                        timestamp,
                    }),
                    Err(e) => {
                        error!("timestamp failed for {repo} branch {name}: {e}");
                        None
                    }
                }
            });
            let mut records: Vec<_> = stamped.into_iter().flatten().collect();
            records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            self.store.save(repo, "branches", &records)?;
            info!("{repo} branches updated");
        }
        Ok(())
    }

    /// Re-blame only the paths whose blob identifier moved since the cached
    /// pass, then rebuild the derived per-author totals from the merged map.
    fn blame(&self, config: &Config, dirty: &[String]) -> Result<()> {
        for repo in dirty {
            let tracked = match collect::tracked_files(&self.repos_dir, repo, self.timeout) {
                Ok(tracked) => tracked,
                Err(e) => {
                    error!("tree listing failed for {repo}: {e}");
                    continue;
                }
            };
            let cache: BlameReport = self.store.load(repo, "files-authors").unwrap_or_default();
            let detect_move = config.detect_move(repo);
            let merged = collect::merge_attributions(&tracked, &cache, &self.pool, |path| {
                collect::blame_file(&self.repos_dir, repo, detect_move, path, self.timeout)
            });
            self.store.save(repo, "files-authors", &merged)?;
            self.store.save(repo, "authors", &collect::author_totals(&merged))?;
            info!("{repo} blame updated");
        }
        Ok(())
    }
}
