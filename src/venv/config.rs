// src/venv/config.rs

//! Per-environment process variables
//!
//! Built once per worker from a snapshot of the parent's variables. Any
//! virtualenv the tool itself runs under is removed from `PATH`, so the
//! child processes resolve `python` and friends from the worker's own
//! environment first.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

#[cfg(windows)]
const PYTHON_EXE: &str = "python.exe";
#[cfg(not(windows))]
const PYTHON_EXE: &str = "python";

/// Immutable set of variables handed to every child of one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Interpreter inside the environment
    pub python: PathBuf,
    vars: BTreeMap<OsString, OsString>,
}

impl EnvConfig {
    /// Derive the variables for an environment rooted at `env_dir`
    ///
    /// `base` is usually `std::env::vars_os()`.
    pub fn new<I, K, V>(base: I, env_dir: &Path) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut vars: BTreeMap<OsString, OsString> = base
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let bin_dir = env_dir.join(BIN_DIR);
        let python = bin_dir.join(PYTHON_EXE);

        let active_venv = vars.remove(OsStr::new("VIRTUAL_ENV")).map(PathBuf::from);
        let inherited: Vec<PathBuf> = vars
            .get(OsStr::new("PATH"))
            .map(|path| env::split_paths(path).collect())
            .unwrap_or_default();

        let inside_active = |entry: &PathBuf| {
            active_venv
                .as_ref()
                .is_some_and(|venv| entry.starts_with(venv))
        };
        let search_path = std::iter::once(bin_dir)
            .chain(inherited.into_iter().filter(|entry| !inside_active(entry)));
        let joined = env::join_paths(search_path)
            .map_err(|e| Error::EnvironmentError(format!("cannot build PATH: {e}")))?;

        vars.remove(OsStr::new("PYTHONHOME"));
        vars.insert("PATH".into(), joined);
        vars.insert("VIRTUAL_ENV".into(), env_dir.as_os_str().to_owned());
        vars.insert("PYTHON".into(), python.as_os_str().to_owned());
        vars.insert(
            "COVERAGE_FILE".into(),
            env_dir.join(".coverage").into_os_string(),
        );

        Ok(Self { python, vars })
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Every variable, for `Command::envs`
    pub fn vars(&self) -> impl Iterator<Item = (&OsString, &OsString)> {
        self.vars.iter()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn build(base: &[(&str, &str)], env_dir: &str) -> EnvConfig {
        EnvConfig::new(base.iter().copied(), Path::new(env_dir)).unwrap()
    }

    #[test]
    fn test_strips_active_virtualenv() {
        let config = build(
            &[
                ("PATH", "/home/u/.venvs/tool/bin:/usr/local/bin:/usr/bin"),
                ("VIRTUAL_ENV", "/home/u/.venvs/tool"),
                ("PYTHONHOME", "/opt/python"),
                ("HOME", "/home/u"),
            ],
            "/tmp/w1",
        );

        assert_eq!(
            config.get("PATH"),
            Some(OsStr::new("/tmp/w1/bin:/usr/local/bin:/usr/bin"))
        );
        assert_eq!(config.get("VIRTUAL_ENV"), Some(OsStr::new("/tmp/w1")));
        assert_eq!(config.get("PYTHON"), Some(OsStr::new("/tmp/w1/bin/python")));
        assert_eq!(config.get("COVERAGE_FILE"), Some(OsStr::new("/tmp/w1/.coverage")));
        assert_eq!(config.get("PYTHONHOME"), None);
        assert_eq!(config.get("HOME"), Some(OsStr::new("/home/u")));
        assert_eq!(config.python, PathBuf::from("/tmp/w1/bin/python"));
    }

    #[test]
    fn test_without_active_virtualenv() {
        let config = build(&[("PATH", "/usr/bin:/bin")], "/tmp/w2");
        assert_eq!(config.get("PATH"), Some(OsStr::new("/tmp/w2/bin:/usr/bin:/bin")));
    }

    #[test]
    fn test_search_path_leads_with_interpreter_dir() {
        let config = build(&[("PATH", "/usr/bin")], "/tmp/w4");
        let path = config.get("PATH").unwrap();
        let first = env::split_paths(path).next().unwrap();
        assert_eq!(Some(first.as_path()), config.python.parent());
    }

    #[test]
    fn test_missing_path() {
        let config = build(&[], "/tmp/w3");
        assert_eq!(config.get("PATH"), Some(OsStr::new("/tmp/w3/bin")));
    }

    #[test]
    fn test_independent_configs() {
        let base = [("PATH", "/usr/bin")];
        let a = build(&base, "/tmp/a");
        let b = build(&base, "/tmp/b");
        assert_ne!(a.get("PATH"), b.get("PATH"));
        assert_eq!(a.get("PATH"), Some(OsStr::new("/tmp/a/bin:/usr/bin")));
    }
}
