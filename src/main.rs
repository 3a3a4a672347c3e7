// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use pessimist::config::Config;
use pessimist::interpreter::{Interpreter, find_python};
use pessimist::requirement::{ClassifiedRequirements, read_requirements_file};
use pessimist::resolver::{ResolveOptions, resolve};
use pessimist::{CheckOptions, Checker, PypiIndex, VenvProvisioner, Version};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "pessimist")]
#[command(author, version, about = "Test a project against the full range of its dependency versions", long_about = None)]
struct Cli {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Test command, run through the shell in the project directory
    #[arg(short, long)]
    command: Option<String>,

    /// Number of workers (each with its own environment)
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Only test the oldest and newest versions
    #[arg(long)]
    fast: bool,

    /// Ignore the declared specifier of a package (`*` for all)
    #[arg(long, value_name = "NAME")]
    extend: Vec<String>,

    /// Requirements file to vary (repeatable)
    #[arg(short, long, value_name = "FILE")]
    requirements: Vec<PathBuf>,

    /// Requirements file to keep pinned at the newest match (repeatable)
    #[arg(long, value_name = "FILE")]
    fixed: Vec<PathBuf>,

    /// Interpreter used to create environments
    #[arg(long, value_name = "PATH")]
    python: Option<PathBuf>,

    /// Filter as if running this interpreter version instead of probing
    #[arg(long, value_name = "VERSION")]
    python_version: Option<String>,

    /// Package index base URL
    #[arg(long, value_name = "URL")]
    index_url: Option<String>,

    /// Installer requirement pinned in every environment
    #[arg(long, value_name = "SPEC", conflicts_with = "no_installer_pin")]
    installer_pin: Option<String>,

    /// Keep whatever installer the environment comes with
    #[arg(long)]
    no_installer_pin: bool,

    /// Configuration file (default: pessimist.toml in the project)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Resolve and print the plans without running anything
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer flags over file settings
    fn apply(&self, config: &mut Config) {
        if let Some(command) = &self.command {
            config.command = command.clone();
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if self.fast {
            config.fast = true;
        }
        if !self.extend.is_empty() {
            config.extend = self.extend.clone();
        }
        if !self.requirements.is_empty() {
            config.requirements = self.requirements.clone();
        }
        if !self.fixed.is_empty() {
            config.fixed = self.fixed.clone();
        }
        if let Some(python) = &self.python {
            config.python = Some(python.clone());
        }
        if let Some(url) = &self.index_url {
            config.index_url = url.clone();
        }
        if let Some(pin) = &self.installer_pin {
            config.installer_pin = pin.clone();
        }
        if self.no_installer_pin {
            config.installer_pin.clear();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let project_dir = cli
        .path
        .canonicalize()
        .with_context(|| format!("Project directory {} not found", cli.path.display()))?;

    let mut config = Config::load(cli.config.as_deref(), &project_dir)?;
    cli.apply(&mut config);
    config.validate()?;
    debug!("Configuration: {:?}", config);

    let variable = read_all(&project_dir, &config.requirements)?;
    let fixed = read_all(&project_dir, &config.fixed)?;
    let classified = ClassifiedRequirements::classify(fixed, variable)?;

    let python = || -> Result<PathBuf> {
        match &config.python {
            Some(path) => Ok(path.clone()),
            None => Ok(find_python()?),
        }
    };

    let interpreter = match &cli.python_version {
        Some(raw) => {
            let version = Version::parse(raw).context("Invalid --python-version")?;
            Interpreter::for_version(version)
        }
        None => Interpreter::probe(&python()?)?,
    };
    info!("Filtering for Python {}", interpreter.version);

    let index = PypiIndex::new(&config.index_url)?;
    let options = ResolveOptions {
        extend: config.extend.clone(),
        fast: config.fast,
    };
    let candidates = resolve(&classified, &index, &interpreter, &options)?;

    let check = CheckOptions {
        command: config.command.clone(),
        parallelism: config.parallelism,
        fast: config.fast,
    };

    if cli.dry_run {
        let mut out = io::stdout().lock();
        writeln!(out, "Candidates:")?;
        for (name, versions) in candidates.iter() {
            let list: Vec<String> = versions.iter().map(Version::to_string).collect();
            writeln!(out, "  {}: {}", name, list.join(", "))?;
        }
        writeln!(out, "Plans:")?;
        for plan in pessimist::plan::schedule(&candidates, config.fast) {
            writeln!(out, "  {plan}")?;
        }
        if !classified.pip_lines.is_empty() {
            writeln!(out, "Passthrough:")?;
            for line in &classified.pip_lines {
                writeln!(out, "  {line}")?;
            }
        }
        return Ok(0);
    }

    let provisioner = VenvProvisioner::new(
        python()?,
        project_dir.clone(),
        config.installer_pin().map(str::to_string),
    );
    let checker = Checker::new(
        Arc::new(provisioner),
        candidates,
        classified.pip_lines,
        check,
    );

    let verdict = checker.run(io::stdout().lock())?;
    Ok(verdict.code())
}

/// Read every requirements file, relative paths resolved against the project
fn read_all(project_dir: &Path, files: &[PathBuf]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for file in files {
        let path = project_dir.join(file);
        let content = read_requirements_file(&path)
            .with_context(|| format!("Failed to read requirements from {}", path.display()))?;
        lines.extend(content);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_rescues_invalid_file_value() {
        let mut config = Config::from_toml_str("parallelism = 0").unwrap();
        assert!(config.validate().is_err());

        let cli = Cli::parse_from(["pessimist", "-p", "4"]);
        cli.apply(&mut config);
        assert_eq!(config.parallelism, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_installer_pin_clears_file_pin() {
        let mut config = Config::default();
        let cli = Cli::parse_from(["pessimist", "--no-installer-pin", "--fast"]);
        cli.apply(&mut config);
        assert_eq!(config.installer_pin(), None);
        assert!(config.fast);
    }
}
