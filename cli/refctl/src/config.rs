//! Configuration management.
//!
//! Handles:
//! - Registry database location
//! - Retry bound for reference writes
//! - Fallback policy when the registry is unreachable
//! - Where unverified references wait while the registry is down

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use we_reference::{FallbackPolicy, DEFAULT_MAX_ATTEMPTS};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Registry database file name.
const DATABASE_FILE: &str = "references.db";

/// Pending (unrecorded) references file name.
const PENDING_FILE: &str = "pending.jsonl";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "world-embalage", "refctl")
}

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Registry database URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Attempts made when a write collides with an existing reference.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// What to do when the registry cannot be queried.
    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// Unverified references issued while the registry was unreachable.
    #[serde(default = "default_pending_file")]
    pub pending_file: PathBuf,
}

fn default_database_url() -> String {
    project_dirs()
        .map(|dirs| {
            let path = dirs.data_dir().join(DATABASE_FILE);
            format!("sqlite://{}", path.display())
        })
        .unwrap_or_else(|| we_registry::DEFAULT_DATABASE_URL.to_string())
}

fn default_pending_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(PENDING_FILE))
        .unwrap_or_else(|| PathBuf::from(PENDING_FILE))
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_attempts: default_max_attempts(),
            fallback: FallbackPolicy::default(),
            pending_file: default_pending_file(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Directory holding the database file, if the URL points at one.
    pub fn database_dir(&self) -> Option<PathBuf> {
        let path = self.database_url.strip_prefix("sqlite://")?;
        PathBuf::from(path).parent().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.database_url.starts_with("sqlite:"));
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.fallback, FallbackPolicy::Strict);
        assert!(config.pending_file.ends_with(PENDING_FILE));
    }

    #[test]
    fn test_config_partial_file() {
        let config = Config::from_json(
            r#"{
                "fallback": "allow_unverified",
                "max_attempts": 5,
                "pending_file": "/tmp/p.jsonl"
            }"#,
        )
        .unwrap();
        assert_eq!(config.fallback, FallbackPolicy::AllowUnverified);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.pending_file, PathBuf::from("/tmp/p.jsonl"));
        assert!(!config.database_url.is_empty());
    }

    #[test]
    fn test_database_dir() {
        let config = Config {
            database_url: "sqlite:///var/lib/we/references.db".to_string(),
            ..Config::default()
        };
        assert_eq!(config.database_dir(), Some(PathBuf::from("/var/lib/we")));

        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        assert_eq!(config.database_dir(), None);
    }
}
