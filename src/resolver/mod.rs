// src/resolver/mod.rs

//! Candidate version resolution
//!
//! Turns classified requirements into one ascending candidate list per
//! tracked package. Releases whose files declare an incompatible
//! `requires_python` are dropped first, then the requirement's own
//! specifier is applied unless the package is listed in `extend`.
//!
//! Fixed requirements always collapse to their newest match. A package that
//! is both fixed and variable is widened to the variable candidates.

use crate::error::{Error, Result};
use crate::index::{PackageIndex, PackageReleases};
use crate::interpreter::Interpreter;
use crate::requirement::{ClassifiedRequirements, Requirement, canonicalize_name};
use crate::version::{SpecifierSet, Version};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `extend` entry that matches every package
pub const EXTEND_ALL: &str = "*";

/// Per-package candidate lists, keyed by canonical name
///
/// Every list is non-empty and ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    versions: BTreeMap<String, Vec<Version>>,
}

impl Candidates {
    /// Build from raw lists, sorting each and dropping empty ones
    pub fn from_map(map: BTreeMap<String, Vec<Version>>) -> Self {
        let versions = map
            .into_iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, mut list)| {
                list.sort();
                list.dedup();
                (name, list)
            })
            .collect();
        Self { versions }
    }

    pub fn get(&self, name: &str) -> Option<&[Version]> {
        self.versions.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Version>)> {
        self.versions.iter()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Oldest candidate of every package
    pub fn floors(&self) -> BTreeMap<String, Version> {
        self.versions
            .iter()
            .filter_map(|(name, list)| list.first().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Newest candidate of every package
    pub fn ceilings(&self) -> BTreeMap<String, Version> {
        self.versions
            .iter()
            .filter_map(|(name, list)| list.last().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Reduce every list to its oldest and newest entries
    pub fn collapse_to_extremes(&mut self) {
        for list in self.versions.values_mut() {
            if list.len() > 2 {
                let newest = list.pop();
                list.truncate(1);
                list.extend(newest);
            }
        }
    }

    fn insert(&mut self, name: String, list: Vec<Version>) {
        self.versions.insert(name, list);
    }
}

/// Knobs for [`resolve`]
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Packages whose declared specifier is ignored (`*` for all)
    pub extend: Vec<String>,
    /// Keep only the extremes of each variable list
    pub fast: bool,
}

/// Find the installable versions of one requirement
///
/// Returns the package metadata and the eligible versions, ascending.
/// With `extend` naming the package (or containing `*`), the requirement's
/// specifier is skipped entirely, pre-releases included, but the
/// interpreter check still applies.
pub fn filter_versions(
    req: &Requirement,
    index: &dyn PackageIndex,
    python_version: &Version,
    extend: Option<&[String]>,
) -> Result<(Arc<PackageReleases>, Vec<Version>)> {
    let name = req.canonical_name();
    let package = index.fetch(&name)?;

    let eligible: Vec<&Version> = package
        .releases
        .iter()
        .filter(|(version, release)| {
            let Some(raw) = release.requires_python() else {
                return true;
            };
            match SpecifierSet::parse(raw) {
                // The running interpreter is accepted even if it is a pre-release
                Ok(spec) => spec.contains_any(python_version),
                Err(e) => {
                    debug!("Ignoring requires_python of {name} {version}: {e}");
                    true
                }
            }
        })
        .map(|(version, _)| version)
        .collect();

    let overridden = extend.is_some_and(|list| {
        list.iter()
            .any(|e| e == EXTEND_ALL || canonicalize_name(e) == name)
    });

    let versions: Vec<Version> = if overridden {
        eligible.into_iter().cloned().collect()
    } else {
        req.specifier.filter(eligible)
    };

    if versions.is_empty() {
        return Err(Error::NoMatchingVersions(req.to_string()));
    }

    Ok((package, versions))
}

/// Resolve every tracked requirement into candidate lists
///
/// Requirements whose marker does not match the interpreter are skipped.
pub fn resolve(
    requirements: &ClassifiedRequirements,
    index: &dyn PackageIndex,
    interpreter: &Interpreter,
    options: &ResolveOptions,
) -> Result<Candidates> {
    let mut candidates = Candidates::default();

    for req in &requirements.fixed {
        if !applies(req, interpreter) {
            continue;
        }

        let (package, versions) = filter_versions(req, index, &interpreter.version, None)?;
        if versions.len() > 1 {
            warn!(
                "More than one version matched {:?}; picking the newest",
                req.to_string()
            );
        }

        let name = req.canonical_name();
        let newest = versions[versions.len() - 1].clone();
        info!(
            "  [fixed] fetched {}: {}/{} allowed; keeping {}",
            req.name,
            versions.len(),
            package.releases.len(),
            newest
        );
        candidates.insert(name, vec![newest]);
    }

    for req in &requirements.variable {
        if !applies(req, interpreter) {
            continue;
        }

        let name = req.canonical_name();
        let (package, versions) = filter_versions(
            req,
            index,
            &interpreter.version,
            Some(options.extend.as_slice()),
        )?;

        info!(
            "  [variable] fetched {}: {}/{} allowed",
            name,
            versions.len(),
            package.releases.len()
        );

        if let Some(fixed) = candidates.get(&name).and_then(|list| list.first()) {
            if !versions.contains(fixed) {
                warn!(
                    "  [variable] fixed version {} not in {} for {:?}",
                    fixed,
                    display_list(&versions),
                    req.to_string()
                );
            }
            info!(
                "  [variable] widen due to variable: {:?} -> {}",
                req.to_string(),
                display_list(&versions)
            );
        }

        candidates.insert(name, versions);
    }

    if options.fast {
        candidates.collapse_to_extremes();
    }

    Ok(candidates)
}

fn applies(req: &Requirement, interpreter: &Interpreter) -> bool {
    match &req.marker {
        Some(marker) if !marker.evaluate(&interpreter.markers) => {
            debug!("Skipping {} (marker '{}' does not match)", req.name, marker);
            false
        }
        _ => true,
    }
}

fn display_list(versions: &[Version]) -> String {
    let items: Vec<String> = versions.iter().map(Version::to_string).collect();
    format!("[{}]", items.join(", "))
}
