// src/venv/mod.rs

//! Isolated environments for running plans
//!
//! Each worker owns one environment for its whole lifetime. The
//! [`Provisioner`] creates it inside a directory the worker owns, and the
//! [`Environment`] installs pins and runs the test command. Child processes
//! get their variables from an immutable [`EnvConfig`]; the process's own
//! environment is never modified.

mod config;

pub use config::EnvConfig;

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Name of the combined stdout/stderr log inside an environment directory
const LOG_FILE: &str = "pessimist.log";

/// Exit status and combined output of one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Command line prefixed with `$ `, then everything it printed
    pub transcript: String,
}

/// Creates environments
pub trait Provisioner: Send + Sync {
    type Env: Environment;

    /// Build a fresh environment inside `dir`
    ///
    /// The caller owns `dir` and removes it after dropping the environment.
    fn create(&self, dir: &Path) -> Result<Self::Env>;
}

/// A provisioned environment
pub trait Environment {
    /// Install `extra_lines` (split on whitespace) and `packages` in one
    /// installer invocation
    fn install(&self, packages: &[String], extra_lines: &[String]) -> Result<CommandOutput>;

    /// Run a shell command in the project directory
    fn run_command(&self, command: &str) -> Result<CommandOutput>;
}

/// Installer arguments for one install step
///
/// Passthrough lines are split on whitespace only; quoting is not
/// understood.
pub fn install_args(packages: &[String], extra_lines: &[String]) -> Vec<String> {
    let mut args: Vec<String> = ["-m", "pip", "install"].map(String::from).into();
    for line in extra_lines {
        args.extend(line.split_whitespace().map(str::to_string));
    }
    args.extend(packages.iter().cloned());
    args
}

/// Provisions environments with `python -m venv`
#[derive(Debug, Clone)]
pub struct VenvProvisioner {
    python: PathBuf,
    project_dir: PathBuf,
    installer_pin: Option<String>,
}

impl VenvProvisioner {
    /// `installer_pin` is installed once per environment, e.g. `pip==20.2`
    pub fn new(python: PathBuf, project_dir: PathBuf, installer_pin: Option<String>) -> Self {
        Self {
            python,
            project_dir,
            installer_pin: installer_pin.filter(|pin| !pin.trim().is_empty()),
        }
    }
}

impl Provisioner for VenvProvisioner {
    type Env = VenvEnvironment;

    fn create(&self, dir: &Path) -> Result<VenvEnvironment> {
        info!("Creating environment in {}", dir.display());

        let output = Command::new(&self.python)
            .args(["-m", "venv"])
            .arg(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::EnvironmentError(format!("failed to run {}: {}", self.python.display(), e))
            })?;

        if !output.status.success() {
            return Err(Error::EnvironmentError(format!(
                "{} -m venv exited with {}: {}",
                self.python.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let config = EnvConfig::new(std::env::vars_os(), dir)?;
        let env = VenvEnvironment {
            config,
            project_dir: self.project_dir.clone(),
            log_path: dir.join(LOG_FILE),
        };

        if let Some(pin) = &self.installer_pin {
            let python = env.config.python.clone();
            let args = ["-m", "pip", "install", pin.as_str()].map(String::from);
            match env.run(&python, &args) {
                Ok(out) if out.success => debug!("Pinned installer to {}", pin),
                Ok(out) => warn!(
                    "Could not pin installer to {} in {}:\n{}",
                    pin,
                    dir.display(),
                    out.transcript
                ),
                Err(e) => warn!("Could not pin installer to {}: {}", pin, e),
            }
        }

        info!("Environment ready in {}", dir.display());
        Ok(env)
    }
}

/// An environment created by [`VenvProvisioner`]
#[derive(Debug)]
pub struct VenvEnvironment {
    config: EnvConfig,
    project_dir: PathBuf,
    log_path: PathBuf,
}

impl VenvEnvironment {
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Run one child process with stdout and stderr sharing a log file
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let shown = std::iter::once(program.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.run_logged(program, args, &shown)
    }

    fn run_logged(&self, program: &Path, args: &[String], shown: &str) -> Result<CommandOutput> {
        debug!("Running: {}", shown);

        let log = File::create(&self.log_path)?;
        let log_err = log.try_clone()?;

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.project_dir)
            .env_clear()
            .envs(self.config.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(|e| {
                Error::EnvironmentError(format!("failed to run {}: {}", program.display(), e))
            })?;

        let output = String::from_utf8_lossy(&fs::read(&self.log_path)?).into_owned();
        debug!("{} exited with {}", shown, status);

        Ok(CommandOutput {
            success: status.success(),
            transcript: format!("$ {shown}\n{output}"),
        })
    }
}

impl Environment for VenvEnvironment {
    fn install(&self, packages: &[String], extra_lines: &[String]) -> Result<CommandOutput> {
        let python = self.config.python.clone();
        self.run(&python, &install_args(packages, extra_lines))
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        let args = [flag.to_string(), command.to_string()];
        self.run_logged(Path::new(shell), &args, command)
    }
}
