// src/index/mod.rs

//! Package index metadata
//!
//! The resolver only needs, per package, the known releases and the
//! `requires_python` declared by each release's distribution files.

mod pypi;

pub use pypi::{DEFAULT_INDEX_URL, PypiIndex};

use crate::error::{Error, Result};
use crate::requirement::canonicalize_name;
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One distribution file of a release (sdist or wheel)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionFile {
    pub filename: String,
    /// Raw `requires_python` specifier, if the file declares one
    pub requires_python: Option<String>,
}

/// All files published for one version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    pub files: Vec<DistributionFile>,
}

impl Release {
    /// The first non-empty `requires_python` declared by any file
    pub fn requires_python(&self) -> Option<&str> {
        self.files.iter().find_map(|f| {
            f.requires_python
                .as_deref()
                .filter(|s| !s.trim().is_empty())
        })
    }
}

/// Every known release of one package, ascending by version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReleases {
    pub name: String,
    pub releases: BTreeMap<Version, Release>,
}

/// Source of package release metadata
///
/// Implementations must be deterministic for a given name during one run;
/// callers may fetch the same package more than once.
pub trait PackageIndex: Send + Sync {
    /// Fetch releases for a package by (any spelling of) its name
    fn fetch(&self, name: &str) -> Result<Arc<PackageReleases>>;
}

/// Fixed in-memory index
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    packages: HashMap<String, Arc<PackageReleases>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package
    ///
    /// `releases` pairs a version string with the `requires_python` of its
    /// single file.
    pub fn insert(&mut self, name: &str, releases: &[(&str, Option<&str>)]) -> Result<()> {
        let mut map = BTreeMap::new();
        for (version, requires_python) in releases {
            let version = Version::parse(version)?;
            let file = DistributionFile {
                filename: format!("{name}-{version}.tar.gz"),
                requires_python: requires_python.map(str::to_string),
            };
            map.insert(version, Release { files: vec![file] });
        }

        self.packages.insert(
            canonicalize_name(name),
            Arc::new(PackageReleases {
                name: name.to_string(),
                releases: map,
            }),
        );
        Ok(())
    }

    /// Builder-style [`MemoryIndex::insert`]
    pub fn with(mut self, name: &str, releases: &[(&str, Option<&str>)]) -> Result<Self> {
        self.insert(name, releases)?;
        Ok(self)
    }
}

impl PackageIndex for MemoryIndex {
    fn fetch(&self, name: &str) -> Result<Arc<PackageReleases>> {
        self.packages
            .get(&canonicalize_name(name))
            .cloned()
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_index_canonical_lookup() {
        let index = MemoryIndex::new()
            .with("Foo_Bar", &[("1.0", None), ("2.0", Some(">=3.6"))])
            .unwrap();

        let releases = index.fetch("foo-bar").unwrap();
        assert_eq!(releases.name, "Foo_Bar");
        let versions: Vec<String> = releases.releases.keys().map(Version::to_string).collect();
        assert_eq!(versions, vec!["1.0", "2.0"]);

        assert!(matches!(index.fetch("missing"), Err(Error::PackageNotFound(_))));
    }

    #[test]
    fn test_release_requires_python_first_declared() {
        let release = Release {
            files: vec![
                DistributionFile {
                    filename: "a.whl".to_string(),
                    requires_python: None,
                },
                DistributionFile {
                    filename: "a.tar.gz".to_string(),
                    requires_python: Some(">=3.8".to_string()),
                },
                DistributionFile {
                    filename: "b.tar.gz".to_string(),
                    requires_python: Some(">=2.7".to_string()),
                },
            ],
        };
        assert_eq!(release.requires_python(), Some(">=3.8"));
        assert_eq!(Release::default().requires_python(), None);
    }
}
