// src/requirement/mod.rs

//! Requirement lines and their classification
//!
//! Input lines are either pip-passthrough directives (editable installs,
//! paths, VCS URLs, `-r` includes) that are handed to the installer
//! verbatim, or structured PEP 508 requirements. Structured requirements are
//! further split into "fixed" (pinned to one version for every plan) and
//! "variable" (the dimension under test).

mod file;

pub use file::{parse_requirements, read_requirements_file};

use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::version::SpecifierSet;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)").expect("name regex is valid")
});

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("separator regex is valid"));

/// Normalize a project name for use as a map key
///
/// Runs of `-`, `_` and `.` collapse to a single `-` and the result is
/// lowercased, so `Foo.Bar`, `foo_bar` and `FOO--bar` are the same package.
pub fn canonicalize_name(name: &str) -> String {
    SEPARATOR_RE.replace_all(name, "-").to_lowercase()
}

/// Check whether a line is an installer directive rather than a requirement
///
/// This is deliberately crude. Anything starting with `-` (`-e ../foo`,
/// `-r other.txt`), containing a `/` (`./`, URLs) or starting with a VCS
/// scheme is passed through to the installer untouched.
pub fn is_pip_line(line: &str) -> bool {
    line.starts_with('-') || line.contains('/') || line.starts_with("git+") || line.starts_with("hg+")
}

/// A structured dependency requirement
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    pub extras: Vec<String>,
    pub specifier: SpecifierSet,
    /// Direct reference (`name @ url`)
    pub url: Option<String>,
    pub marker: Option<Marker>,
    raw: String,
}

impl Requirement {
    /// Parse a requirement such as `requests[socks]>=2.0,<3; python_version >= "3.8"`
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim().to_string();
        let invalid = |reason: &str| Error::InvalidRequirement {
            input: raw.clone(),
            reason: reason.to_string(),
        };

        let (body, marker) = match raw.split_once(';') {
            Some((body, marker)) => (body.trim(), Some(Marker::parse(marker.trim())?)),
            None => (raw.as_str(), None),
        };

        let name = NAME_RE
            .find(body)
            .ok_or_else(|| invalid("missing project name"))?
            .as_str()
            .to_string();
        let mut rest = body[name.len()..].trim_start();

        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let (inner, tail) = after
                .split_once(']')
                .ok_or_else(|| invalid("unterminated extras"))?;
            extras = inner
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            rest = tail.trim_start();
        }

        let mut url = None;
        let specifier = if let Some(reference) = rest.strip_prefix('@') {
            let reference = reference.trim();
            if reference.is_empty() {
                return Err(invalid("empty URL"));
            }
            url = Some(reference.to_string());
            SpecifierSet::default()
        } else {
            let spec = match rest.strip_prefix('(') {
                Some(inner) => inner
                    .strip_suffix(')')
                    .ok_or_else(|| invalid("unbalanced parentheses"))?,
                None => rest,
            };
            SpecifierSet::parse(spec).map_err(|e| invalid(&e.to_string()))?
        };

        Ok(Self {
            name,
            extras,
            specifier,
            url,
            marker,
            raw,
        })
    }

    /// Canonical project name (see [`canonicalize_name`])
    pub fn canonical_name(&self) -> String {
        canonicalize_name(&self.name)
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Requirement lines sorted into the three kinds the planner cares about
#[derive(Debug, Clone, Default)]
pub struct ClassifiedRequirements {
    /// Installer directives passed through verbatim on every install
    pub pip_lines: Vec<String>,
    pub fixed: Vec<Requirement>,
    pub variable: Vec<Requirement>,
}

impl ClassifiedRequirements {
    /// Sort raw `fixed` and `variable` lines
    ///
    /// Passthrough lines are collected from both inputs.
    pub fn classify<F, V>(fixed: F, variable: V) -> Result<Self>
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        let mut classified = Self::default();

        for line in fixed {
            let line = line.as_ref().trim();
            if is_pip_line(line) {
                classified.pip_lines.push(line.to_string());
            } else {
                classified.fixed.push(Requirement::parse(line)?);
            }
        }

        for line in variable {
            let line = line.as_ref().trim();
            if is_pip_line(line) {
                classified.pip_lines.push(line.to_string());
            } else {
                classified.variable.push(Requirement::parse(line)?);
            }
        }

        Ok(classified)
    }
}
