// src/version/mod.rs

//! Version handling and specifier matching for Python packages
//!
//! This module provides PEP 440 version parsing and ordering, plus the
//! specifier sets used both by requirements (`requests>=2.0,<3`) and by the
//! `requires_python` declarations on distributed files.

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>[0-9]+)?)?
        (?:(?:-(?P<post_n1>[0-9]+))|(?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?))?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .expect("version regex is valid")
});

/// Pre-release phase, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreRelease {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "a" | "alpha" => Self::Alpha,
            "b" | "beta" => Self::Beta,
            _ => Self::ReleaseCandidate,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::ReleaseCandidate => "rc",
        }
    }
}

/// One dot-separated segment of a local version label
///
/// Alphanumeric segments sort before numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
    Text(String),
    Number(u64),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A parsed PEP 440 version
///
/// Format: `[N!]N(.N)*[{a|b|rc}N][.postN][.devN][+local]`
/// Examples:
/// - "2.0" → release=[2, 0]
/// - "1!2.0" → epoch=1, release=[2, 0]
/// - "1.0rc1" → release=[1, 0], pre=(rc, 1)
/// - "1.0.post2.dev3+ubuntu.1" → post=2, dev=3, local=[ubuntu, 1]
#[derive(Debug, Clone)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreRelease, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<Vec<LocalSegment>>,
}

fn parse_number(s: &str, input: &str) -> Result<u64> {
    s.parse::<u64>()
        .map_err(|_| Error::InvalidVersion(input.to_string()))
}

impl Version {
    /// Parse a version string, accepting the usual spelling variants
    pub fn parse(s: &str) -> Result<Self> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;

        let epoch = match caps.name("epoch") {
            Some(m) => parse_number(m.as_str(), s)?,
            None => 0,
        };

        let release = caps["release"]
            .split('.')
            .map(|part| parse_number(part, s))
            .collect::<Result<Vec<_>>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let n = match caps.name("pre_n") {
                    Some(m) => parse_number(m.as_str(), s)?,
                    None => 0,
                };
                Some((PreRelease::parse(label.as_str()), n))
            }
            None => None,
        };

        let post = if let Some(m) = caps.name("post_n1") {
            Some(parse_number(m.as_str(), s)?)
        } else if caps.name("post_l").is_some() {
            match caps.name("post_n2") {
                Some(m) => Some(parse_number(m.as_str(), s)?),
                None => Some(0),
            }
        } else {
            None
        };

        let dev = match caps.name("dev_l") {
            Some(_) => match caps.name("dev_n") {
                Some(m) => Some(parse_number(m.as_str(), s)?),
                None => Some(0),
            },
            None => None,
        };

        let local = caps.name("local").map(|m| {
            m.as_str()
                .split(['-', '_', '.'])
                .map(|seg| match seg.parse::<u64>() {
                    Ok(n) => LocalSegment::Number(n),
                    Err(_) => LocalSegment::Text(seg.to_lowercase()),
                })
                .collect()
        });

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Pre-releases and development releases are both "pre-release" for
    /// the purpose of default exclusion
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// The version without its local label
    pub fn public(&self) -> Version {
        Version {
            local: None,
            ..self.clone()
        }
    }

    /// Epoch and release only (`1!2.0rc1.post3` → `1!2.0`)
    pub fn base(&self) -> Version {
        Version {
            epoch: self.epoch,
            release: self.release.clone(),
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    /// Release segments with trailing zeros removed
    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }

    fn compare(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }

    // dev-only releases (1.0.dev1) sort before any pre-release of the same
    // release; final releases sort after all of them
    fn pre_key(&self) -> (u8, Option<(PreRelease, u64)>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            (None, _, _) => (2, None),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release = self
            .release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}", release)?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        if let Some(local) = &self.local {
            let label = local
                .iter()
                .map(LocalSegment::to_string)
                .collect::<Vec<_>>()
                .join(".");
            write!(f, "+{}", label)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Specifier comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `~=`
    Compatible,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<=`
    LessOrEqual,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `===`
    Arbitrary,
}

impl Operator {
    /// Longest operators first so `===` is not read as `==`
    const ALL: [(&'static str, Operator); 8] = [
        ("===", Operator::Arbitrary),
        ("~=", Operator::Compatible),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessOrEqual),
        (">=", Operator::GreaterOrEqual),
        ("<", Operator::LessThan),
        (">", Operator::GreaterThan),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compatible => "~=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Arbitrary => "===",
        }
    }
}

/// A single version specifier such as `>=1.2` or `==2.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub operator: Operator,
    /// Parsed version; for `===` this is only set when the literal parses
    pub version: Option<Version>,
    /// Raw version text after the operator (without any `.*`)
    pub literal: String,
    /// `==X.*` / `!=X.*`
    pub wildcard: bool,
}

impl Specifier {
    /// Parse a specifier string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "==2.*" → Equal(2) with wildcard
    /// - "~=1.4.2" → Compatible(1.4.2)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (operator, rest) = Operator::ALL
            .iter()
            .find_map(|&(token, op)| s.strip_prefix(token).map(|rest| (op, rest.trim())))
            .ok_or_else(|| Error::InvalidSpecifier(s.to_string()))?;

        if rest.is_empty() {
            return Err(Error::InvalidSpecifier(s.to_string()));
        }

        if operator == Operator::Arbitrary {
            return Ok(Self {
                operator,
                version: Version::parse(rest).ok(),
                literal: rest.to_string(),
                wildcard: false,
            });
        }

        let (literal, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };

        if wildcard && !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return Err(Error::InvalidSpecifier(s.to_string()));
        }

        let version =
            Version::parse(literal).map_err(|_| Error::InvalidSpecifier(s.to_string()))?;

        if operator == Operator::Compatible && version.release.len() < 2 {
            return Err(Error::InvalidSpecifier(s.to_string()));
        }

        Ok(Self {
            operator,
            version: Some(version),
            literal: literal.to_string(),
            wildcard,
        })
    }

    /// Whether this specifier explicitly asks for a pre-release
    pub fn allows_prereleases(&self) -> bool {
        matches!(
            self.operator,
            Operator::Equal
                | Operator::LessOrEqual
                | Operator::GreaterOrEqual
                | Operator::Compatible
                | Operator::Arbitrary
        ) && self.version.as_ref().is_some_and(Version::is_prerelease)
    }

    /// Check if a version satisfies this specifier, ignoring the
    /// pre-release policy
    pub fn matches(&self, candidate: &Version) -> bool {
        let Some(spec) = &self.version else {
            // `===` with an unparseable literal only matches verbatim text
            return candidate.to_string().eq_ignore_ascii_case(&self.literal);
        };

        match self.operator {
            Operator::Arbitrary => candidate.to_string().eq_ignore_ascii_case(&self.literal),
            Operator::Equal => self.equal(spec, candidate),
            Operator::NotEqual => !self.equal(spec, candidate),
            Operator::LessOrEqual => candidate.public() <= *spec,
            Operator::GreaterOrEqual => candidate.public() >= *spec,
            Operator::LessThan => {
                candidate < spec
                    && !(!spec.is_prerelease()
                        && candidate.is_prerelease()
                        && candidate.base() == spec.base())
            }
            Operator::GreaterThan => {
                candidate > spec
                    && !(!spec.is_postrelease()
                        && candidate.is_postrelease()
                        && candidate.base() == spec.base())
                    && !(candidate.local.is_some() && candidate.public() == *spec)
            }
            Operator::Compatible => {
                let prefix = &spec.release[..spec.release.len() - 1];
                candidate >= spec && prefix_matches(spec.epoch, prefix, candidate)
            }
        }
    }

    fn equal(&self, spec: &Version, candidate: &Version) -> bool {
        if self.wildcard {
            return prefix_matches(spec.epoch, &spec.release, candidate);
        }
        if spec.local.is_some() {
            candidate == spec
        } else {
            candidate.public() == *spec
        }
    }
}

fn prefix_matches(epoch: u64, prefix: &[u64], candidate: &Version) -> bool {
    candidate.epoch == epoch
        && prefix
            .iter()
            .enumerate()
            .all(|(i, n)| candidate.release.get(i).copied().unwrap_or(0) == *n)
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.literal)?;
        if self.wildcard {
            write!(f, ".*")?;
        }
        Ok(())
    }
}

/// A comma-separated set of specifiers, all of which must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    /// Parse a comma separated list; an empty string matches everything
    pub fn parse(s: &str) -> Result<Self> {
        let specifiers = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Specifier::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specifiers.iter()
    }

    /// Pre-releases are acceptable if any specifier names one
    pub fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::allows_prereleases)
    }

    fn matches_all(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|s| s.matches(version))
    }

    /// Membership test with the default pre-release policy
    pub fn contains(&self, version: &Version) -> bool {
        if version.is_prerelease() && !self.allows_prereleases() {
            return false;
        }
        self.matches_all(version)
    }

    /// Membership test that accepts pre-releases unconditionally
    pub fn contains_any(&self, version: &Version) -> bool {
        self.matches_all(version)
    }

    /// Keep the matching versions, preserving order
    ///
    /// Pre-releases are only returned when the set asks for them or when no
    /// final release matches at all.
    pub fn filter<'a, I>(&self, versions: I) -> Vec<Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let allow_pre = self.allows_prereleases();
        let mut finals = Vec::new();
        let mut prereleases = Vec::new();

        for version in versions {
            if !self.matches_all(version) {
                continue;
            }
            if version.is_prerelease() && !allow_pre {
                prereleases.push(version.clone());
            } else {
                finals.push(version.clone());
            }
        }

        if finals.is_empty() { prereleases } else { finals }
    }
}

impl FromStr for SpecifierSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .specifiers
            .iter()
            .map(Specifier::to_string)
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join(","))
    }
}
