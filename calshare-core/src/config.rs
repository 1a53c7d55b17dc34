//! calshare configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ARTIFACTS, DEFAULT_MAX_DRAFTS, DEFAULT_RETENTION_DAYS};
use crate::error::{CalShareError, CalShareResult};

static DEFAULT_DATA_DIR: &str = "~/.local/share/calshare";

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("calshare"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn default_retention() -> String {
    format!("{}days", DEFAULT_RETENTION_DAYS)
}

fn default_max_drafts() -> usize {
    DEFAULT_MAX_DRAFTS
}

fn default_max_artifacts() -> usize {
    DEFAULT_MAX_ARTIFACTS
}

fn default_entitled() -> bool {
    true
}

/// Configuration at ~/.config/calshare/config.toml
///
/// Every key can be overridden with a `CALSHARE_`-prefixed environment
/// variable, e.g. `CALSHARE_RETENTION=30days`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalShareConfig {
    /// How long uploaded files are kept, as a humantime duration ("7days")
    #[serde(default = "default_retention")]
    pub retention: String,

    #[serde(default = "default_max_drafts")]
    pub max_drafts: usize,

    #[serde(default = "default_max_artifacts")]
    pub max_artifacts: usize,

    /// Holds the object store and history file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where local copies are written; defaults to the OS temp dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    #[serde(default = "default_entitled")]
    pub entitled: bool,
}

impl Default for CalShareConfig {
    fn default() -> Self {
        CalShareConfig {
            retention: default_retention(),
            max_drafts: DEFAULT_MAX_DRAFTS,
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            data_dir: default_data_dir(),
            temp_dir: None,
            entitled: true,
        }
    }
}

impl CalShareConfig {
    pub fn config_path() -> CalShareResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalShareError::Config("Could not determine config directory".into()))?
            .join("calshare");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file (creating a commented-out one on first run) and
    /// apply environment overrides.
    pub fn load() -> CalShareResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> CalShareResult<Self> {
        let config: CalShareConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("CALSHARE"))
            .build()
            .map_err(|e| CalShareError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalShareError::Config(e.to_string()))?;

        // Fail early on a bad duration rather than at sweep time
        config.retention()?;
        Ok(config)
    }

    /// Retention window parsed from the `retention` setting.
    pub fn retention(&self) -> CalShareResult<Duration> {
        let std_duration = humantime::parse_duration(&self.retention).map_err(|e| {
            CalShareError::Config(format!("Invalid retention '{}': {}", self.retention, e))
        })?;

        Duration::from_std(std_duration)
            .map_err(|e| CalShareError::Config(format!("Retention out of range: {}", e)))
    }

    pub fn data_path(&self) -> PathBuf {
        expand(&self.data_dir)
    }

    pub fn objects_path(&self) -> PathBuf {
        self.data_path().join("objects")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_path().join("history.json")
    }

    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir
            .as_deref()
            .map(expand)
            .unwrap_or_else(crate::storage::TempDirStore::default_path)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalShareResult<()> {
        let contents = format!(
            "\
# calshare configuration

# How long shared files stay available (e.g. \"7days\", \"30days\"):
# retention = \"{}days\"

# Maximum events per file and generated files kept at once:
# max_drafts = {}
# max_artifacts = {}

# Where uploaded files and history live:
# data_dir = \"{}\"

# Where local copies for direct sharing are written:
# temp_dir = \"/tmp/calshare\"
",
            DEFAULT_RETENTION_DAYS, DEFAULT_MAX_DRAFTS, DEFAULT_MAX_ARTIFACTS, DEFAULT_DATA_DIR
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalShareError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalShareError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        CalShareConfig::create_default_config(&path).unwrap();

        let config = CalShareConfig::load_from(&path).unwrap();

        assert_eq!(config.retention().unwrap(), Duration::days(DEFAULT_RETENTION_DAYS));
        assert_eq!(config.max_drafts, DEFAULT_MAX_DRAFTS);
        assert_eq!(config.max_artifacts, DEFAULT_MAX_ARTIFACTS);
        assert!(config.entitled);
    }

    #[test]
    fn test_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "retention = \"30days\"\nmax_drafts = 5\ndata_dir = \"/srv/calshare\"\n",
        )
        .unwrap();

        let config = CalShareConfig::load_from(&path).unwrap();

        assert_eq!(config.retention().unwrap(), Duration::days(30));
        assert_eq!(config.max_drafts, 5);
        assert_eq!(config.history_path(), PathBuf::from("/srv/calshare/history.json"));
        assert_eq!(config.objects_path(), PathBuf::from("/srv/calshare/objects"));
    }

    #[test]
    fn test_invalid_retention_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retention = \"a while\"\n").unwrap();

        let err = CalShareConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CalShareError::Config(_)), "Got: {}", err);
    }
}
