use crate::error::{FleetError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Static run configuration, loaded once at startup and validated eagerly
/// so a broken fleet definition fails before any repository is touched.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root working directory; clones live under `repos/`, reports under `data/`.
    pub workdir: PathBuf,
    /// Worker pool size override; host CPU count when absent.
    #[serde(default)]
    pub pool_size: Option<usize>,
    /// Per-invocation external command timeout, seconds. Off when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Treat any repository sync failure as fatal to the whole run.
    #[serde(default)]
    pub fail_fast: bool,
    /// The fleet, in configuration order.
    pub repositories: Vec<RepoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    pub clone: String,
    /// Enable move/copy detection when blaming this repository.
    #[serde(default)]
    pub detect_move: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| FleetError::Config(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workdir.as_os_str().is_empty() {
            return Err(FleetError::Config("workdir must not be empty".into()));
        }
        if self.repositories.is_empty() {
            return Err(FleetError::Config(
                "at least one [[repositories]] entry is required".into(),
            ));
        }
        if self.pool_size == Some(0) {
            return Err(FleetError::Config("pool_size must be positive".into()));
        }
        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.name.is_empty() || repo.clone.is_empty() {
                return Err(FleetError::Config(format!(
                    "repository `{}` needs both a name and a clone source",
                    repo.name
                )));
            }
            if repo.name.contains('/') || repo.name.contains("..") {
                return Err(FleetError::Config(format!(
                    "repository name `{}` must be a plain directory name",
                    repo.name
                )));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(FleetError::Config(format!(
                    "duplicate repository name `{}`",
                    repo.name
                )));
            }
        }
        Ok(())
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.workdir.join("repos")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.workdir.join("data")
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn detect_move(&self, repo: &str) -> bool {
        self.repositories
            .iter()
            .any(|r| r.name == repo && r.detect_move)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Config> {
        let config: Config = toml::from_str(raw).map_err(|e| FleetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_config_parses() {
        let config = parse(
            r#"
            workdir = "/tmp/fleet"

            [[repositories]]
            name = "alpha"
            clone = "https://example.com/alpha.git"
            "#,
        )
        .unwrap();
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.repos_dir(), PathBuf::from("/tmp/fleet/repos"));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/fleet/data"));
        assert!(!config.detect_move("alpha"));
        assert!(config.command_timeout().is_none());
    }

    #[test]
    fn detect_move_is_per_repository() {
        let config = parse(
            r#"
            workdir = "/tmp/fleet"

            [[repositories]]
            name = "alpha"
            clone = "a"
            detect_move = true

            [[repositories]]
            name = "beta"
            clone = "b"
            "#,
        )
        .unwrap();
        assert!(config.detect_move("alpha"));
        assert!(!config.detect_move("beta"));
    }

    #[test]
    fn repositories_keep_configuration_order() {
        let config = parse(
            r#"
            workdir = "/tmp/fleet"

            [[repositories]]
            name = "zeta"
            clone = "z"

            [[repositories]]
            name = "alpha"
            clone = "a"
            "#,
        )
        .unwrap();
        let names: Vec<_> = config.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[test]
    fn empty_repository_list_is_rejected() {
        let err = parse("workdir = \"/tmp/fleet\"\nrepositories = []").unwrap_err();
        assert!(err.to_string().contains("repositories"));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = parse(
            r#"
            workdir = "/tmp/fleet"
            pool_size = 0

            [[repositories]]
            name = "alpha"
            clone = "a"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = parse(
            r#"
            workdir = "/tmp/fleet"

            [[repositories]]
            name = "alpha"
            clone = "a"

            [[repositories]]
            name = "alpha"
            clone = "b"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
