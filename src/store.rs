use crate::error::{FleetError, Result};
use crate::model::RepoState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk report store: one JSON document per `(repository, report kind)`
/// under `<data_dir>/<repository>/<kind>.json`, plus root-level documents.
///
/// The store is the only component that touches persisted report state; the
/// orchestrator hands collectors in-memory copies. A document that is
/// missing or unreadable is treated as absent, so a corrupt cache costs a
/// recomputation, never the run.
pub struct DataStore {
    data_dir: PathBuf,
}

pub const REPO_STATES: &str = "repos";
pub const LAST_UPDATE: &str = "last_update";

impl DataStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .map_err(|e| FleetError::Store(format!("cannot create {}: {e}", data_dir.display())))?;
        Ok(Self { data_dir })
    }

    pub fn load<T: DeserializeOwned>(&self, repo: &str, kind: &str) -> Option<T> {
        self.read_document(&self.report_path(repo, kind))
    }

    pub fn save<T: Serialize>(&self, repo: &str, kind: &str, value: &T) -> Result<()> {
        let path = self.report_path(repo, kind);
        self.write_document(&path, value)
    }

    pub fn load_root<T: DeserializeOwned>(&self, kind: &str) -> Option<T> {
        self.read_document(&self.root_path(kind))
    }

    pub fn save_root<T: Serialize>(&self, kind: &str, value: &T) -> Result<()> {
        self.write_document(&self.root_path(kind), value)
    }

    pub fn load_repo_states(&self) -> BTreeMap<String, RepoState> {
        self.load_root(REPO_STATES).unwrap_or_default()
    }

    pub fn save_repo_states(&self, states: &BTreeMap<String, RepoState>) -> Result<()> {
        self.save_root(REPO_STATES, states)
    }

    /// Stamp the run complete. Written exactly once, after the final phase
    /// drains; everything before it is already valid on disk.
    pub fn save_last_update(&self, timestamp: i64) -> Result<()> {
        let mut doc = BTreeMap::new();
        doc.insert("last_updated", timestamp);
        self.save_root(LAST_UPDATE, &doc)
    }

    fn report_path(&self, repo: &str, kind: &str) -> PathBuf {
        self.data_dir.join(repo).join(format!("{kind}.json"))
    }

    fn root_path(&self, kind: &str) -> PathBuf {
        self.data_dir.join(format!("{kind}.json"))
    }

    fn read_document<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("ignoring unreadable document {}: {e}", path.display());
                None
            }
        }
    }

    fn write_document<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec(value)?;
        fs::write(path, raw)?;
        Ok(())
    }
}
