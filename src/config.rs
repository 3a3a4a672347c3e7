// src/config.rs

//! Run configuration
//!
//! Settings come from an optional `pessimist.toml`; command-line flags are
//! applied on top by the binary. Lookup order is an explicit path, then the
//! project directory, then the per-user config directory.

use crate::error::{Error, Result};
use crate::index::DEFAULT_INDEX_URL;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file name
pub const CONFIG_FILE: &str = "pessimist.toml";

/// Default test command
pub const DEFAULT_COMMAND: &str = "make test";

/// Default number of workers
pub const DEFAULT_PARALLELISM: usize = 10;

/// Installer version pinned in every environment
pub const DEFAULT_INSTALLER_PIN: &str = "pip==20.2";

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Test command, run through the shell in the project directory
    pub command: String,
    pub parallelism: usize,
    /// Only test the oldest and newest candidates
    pub fast: bool,
    /// Packages whose declared specifier is ignored (`*` for all)
    pub extend: Vec<String>,
    /// Requirements files whose entries are varied
    pub requirements: Vec<PathBuf>,
    /// Requirements files whose entries stay pinned to their newest match
    pub fixed: Vec<PathBuf>,
    /// Interpreter used to build environments; searched on PATH if unset
    pub python: Option<PathBuf>,
    /// Installer pin; empty disables pinning
    pub installer_pin: String,
    pub index_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            parallelism: DEFAULT_PARALLELISM,
            fast: false,
            extend: Vec::new(),
            requirements: vec![PathBuf::from("requirements.txt")],
            fixed: Vec::new(),
            python: None,
            installer_pin: DEFAULT_INSTALLER_PIN.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
        }
    }
}

impl Config {
    /// Parse TOML text
    ///
    /// Values are not checked here; command-line overrides apply first and
    /// the caller runs [`Config::validate`] on the merged result.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Find and load the configuration for a project
    ///
    /// An explicit path must exist. Otherwise the first existing file among
    /// [`search_paths`] is used, falling back to defaults.
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match search_paths(project_dir).into_iter().find(|p| p.is_file()) {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No {} found; using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    /// The installer pin, if pinning is enabled
    pub fn installer_pin(&self) -> Option<&str> {
        let pin = self.installer_pin.trim();
        (!pin.is_empty()).then_some(pin)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::ConfigError("command must not be empty".to_string()));
        }
        if self.parallelism == 0 {
            return Err(Error::ConfigError(
                "parallelism must be at least 1".to_string(),
            ));
        }
        let url = url::Url::parse(&self.index_url).map_err(|e| {
            Error::ConfigError(format!("invalid index_url '{}': {}", self.index_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "unsupported index_url scheme '{}'",
                url.scheme()
            )));
        }
        Ok(())
    }
}

/// Candidate configuration files, most specific first
pub fn search_paths(project_dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![project_dir.join(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pessimist").join(CONFIG_FILE));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.command, "make test");
        assert_eq!(config.parallelism, 10);
        assert_eq!(config.installer_pin(), Some("pip==20.2"));
        assert_eq!(config.requirements, vec![PathBuf::from("requirements.txt")]);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            command = "pytest -x"
            parallelism = 4
            fast = true
            extend = ["attrs", "*"]
            requirements = ["requirements.txt", "requirements-extra.txt"]
            fixed = ["constraints.txt"]
            python = "/usr/bin/python3.9"
            installer_pin = ""
            index_url = "https://mirror.example.com/pypi"
            "#,
        )
        .unwrap();

        assert_eq!(config.command, "pytest -x");
        assert_eq!(config.parallelism, 4);
        assert!(config.fast);
        assert_eq!(config.extend, vec!["attrs", "*"]);
        assert_eq!(config.fixed, vec![PathBuf::from("constraints.txt")]);
        assert_eq!(config.python, Some(PathBuf::from("/usr/bin/python3.9")));
        assert_eq!(config.installer_pin(), None);
        assert_eq!(config.index_url, "https://mirror.example.com/pypi");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml_str("comand = \"make\"").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let invalid = [
            "parallelism = 0",
            "command = \"  \"",
            "index_url = \"not a url\"",
            "index_url = \"ftp://mirror/pypi\"",
        ];
        for content in invalid {
            let config = Config::from_toml_str(content).unwrap();
            assert!(config.validate().is_err(), "{content}");
        }
        assert!(Config::from_toml_str("parallelism = -1").is_err());
    }

    #[test]
    fn test_file_value_overridden_before_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "parallelism = 0\n").unwrap();

        let mut config = Config::load(Some(&path), dir.path()).unwrap();
        assert!(config.validate().is_err());

        config.parallelism = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_project_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "command = \"tox\"\n").unwrap();

        let config = Config::load(None, dir.path()).unwrap();
        assert_eq!(config.command, "tox");
    }

    #[test]
    fn test_load_explicit_missing() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")), dir.path());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_search_paths_start_with_project() {
        let paths = search_paths(Path::new("/src/project"));
        assert_eq!(paths[0], PathBuf::from("/src/project/pessimist.toml"));
    }
}
