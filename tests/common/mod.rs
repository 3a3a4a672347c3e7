// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pessimist::venv::CommandOutput;
use pessimist::{
    CheckOptions, Checker, Environment, MemoryIndex, Provisioner, Result, Verdict, Version,
};
use pessimist::resolver::Candidates;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// What the fake environment does for a set of pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pass,
    FailInstall,
    FailTest,
}

pub type Rule = Arc<dyn Fn(&[String]) -> Step + Send + Sync>;

/// Provisioner whose environments never touch the filesystem
///
/// Every install is recorded as one line: passthrough lines, then pins.
#[derive(Clone)]
pub struct FakeProvisioner {
    rule: Rule,
    fail_create: bool,
    pub installs: Arc<Mutex<Vec<String>>>,
}

impl FakeProvisioner {
    pub fn new(rule: impl Fn(&[String]) -> Step + Send + Sync + 'static) -> Self {
        Self {
            rule: Arc::new(rule),
            fail_create: false,
            installs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every plan passes
    pub fn passing() -> Self {
        Self::new(|_| Step::Pass)
    }

    /// Test step fails whenever any of `pins` is installed
    pub fn failing_on(pins: &[&str]) -> Self {
        let pins: Vec<String> = pins.iter().map(|p| p.to_string()).collect();
        Self::new(move |installed| {
            if installed.iter().any(|p| pins.contains(p)) {
                Step::FailTest
            } else {
                Step::Pass
            }
        })
    }

    /// Environment creation always fails
    pub fn broken() -> Self {
        let mut provisioner = Self::passing();
        provisioner.fail_create = true;
        provisioner
    }
}

impl Provisioner for FakeProvisioner {
    type Env = FakeEnv;

    fn create(&self, _dir: &Path) -> Result<FakeEnv> {
        if self.fail_create {
            return Err(pessimist::Error::EnvironmentError(
                "python -m venv failed".to_string(),
            ));
        }
        Ok(FakeEnv {
            rule: Arc::clone(&self.rule),
            installs: Arc::clone(&self.installs),
            installed: RefCell::new(Vec::new()),
        })
    }
}

pub struct FakeEnv {
    rule: Rule,
    installs: Arc<Mutex<Vec<String>>>,
    installed: RefCell<Vec<String>>,
}

impl Environment for FakeEnv {
    fn install(&self, packages: &[String], extra_lines: &[String]) -> Result<CommandOutput> {
        let line = extra_lines
            .iter()
            .chain(packages)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        self.installs.lock().unwrap().push(line.clone());
        *self.installed.borrow_mut() = packages.to_vec();

        let success = (self.rule)(packages) != Step::FailInstall;
        Ok(CommandOutput {
            success,
            transcript: format!("$ pip install {line}\n"),
        })
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let success = (self.rule)(&self.installed.borrow()) != Step::FailTest;
        let result = if success { "passed" } else { "failed" };
        Ok(CommandOutput {
            success,
            transcript: format!("$ {command}\n{result}\n"),
        })
    }
}

pub fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

/// Candidate lists from literal versions
pub fn candidates(entries: &[(&str, &[&str])]) -> Candidates {
    let map: BTreeMap<String, Vec<Version>> = entries
        .iter()
        .map(|(name, versions)| (name.to_string(), versions.iter().map(|s| v(s)).collect()))
        .collect();
    Candidates::from_map(map)
}

/// Index with a handful of packages for end-to-end resolution
pub fn sample_index() -> MemoryIndex {
    MemoryIndex::new()
        .with(
            "attrs",
            &[
                ("18.2.0", None),
                ("19.1.0", Some(">=2.7")),
                ("19.3.0", None),
                ("20.1.0", Some(">=3.8")),
            ],
        )
        .unwrap()
        .with("six", &[("1.14.0", None), ("1.15.0", None), ("1.16.0", None)])
        .unwrap()
        .with("Click", &[("7.0", None), ("7.1.2", None), ("8.0.0a1", None)])
        .unwrap()
}

pub fn options(fast: bool, parallelism: usize) -> CheckOptions {
    CheckOptions {
        command: "make test".to_string(),
        parallelism,
        fast,
    }
}

/// Run a checker and return its verdict with the report text
pub fn run_check(
    provisioner: FakeProvisioner,
    candidates: Candidates,
    pip_lines: Vec<String>,
    options: CheckOptions,
) -> (Verdict, String) {
    let checker = Checker::new(Arc::new(provisioner), candidates, pip_lines, options);
    let mut out = Vec::new();
    let verdict = checker.run(&mut out).unwrap();
    (verdict, String::from_utf8(out).unwrap())
}
