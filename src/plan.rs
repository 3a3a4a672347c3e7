// src/plan.rs

//! Test plan generation
//!
//! A plan is one combination of pinned versions. The set is linear in the
//! number of candidates: one "max" plan, plus one plan per non-newest
//! candidate of each package with every other package left at its newest.
//! The cross product is never explored.

use crate::resolver::Candidates;
use crate::version::Version;
use std::collections::BTreeMap;
use std::fmt;

/// Title of the all-newest plan
pub const MAX_TITLE: &str = "max";

/// Title of the all-oldest plan and of the final confirmation plan
pub const MIN_TITLE: &str = "min";

/// The package a single-dimension plan varies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub version: Version,
}

/// A named set of pins to install and test together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub title: String,
    /// Canonical package name to pinned version
    pub versions: BTreeMap<String, Version>,
    /// A failure aborts the run
    pub fatal: bool,
    /// Set only on single-dimension plans
    pub target: Option<Target>,
}

impl Plan {
    /// `name==version` installer arguments
    pub fn pins(&self) -> Vec<String> {
        self.versions
            .iter()
            .map(|(name, version)| format!("{name}=={version}"))
            .collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.pins().join(" "))
    }
}

/// Every package at its newest candidate
pub fn max_plan(candidates: &Candidates) -> Plan {
    Plan {
        title: MAX_TITLE.to_string(),
        versions: candidates.ceilings(),
        fatal: true,
        target: None,
    }
}

/// Every package at its oldest candidate
pub fn min_plan(candidates: &Candidates) -> Plan {
    Plan {
        title: MIN_TITLE.to_string(),
        versions: candidates.floors(),
        fatal: true,
        target: None,
    }
}

/// One non-fatal plan per non-newest candidate of each package
pub fn intermediate_plans(candidates: &Candidates) -> Vec<Plan> {
    let max = candidates.ceilings();
    let mut plans = Vec::new();

    for (name, versions) in candidates.iter() {
        let Some((_, older)) = versions.split_last() else {
            continue;
        };
        for version in older {
            let mut pins = max.clone();
            pins.insert(name.clone(), version.clone());
            plans.push(Plan {
                title: format!("{name}:{version}"),
                versions: pins,
                fatal: false,
                target: Some(Target {
                    name: name.clone(),
                    version: version.clone(),
                }),
            });
        }
    }

    plans
}

/// Plans to submit, in submission order
///
/// Always starts with the max plan. Fast mode follows it with the min plan
/// only; otherwise every intermediate plan follows.
pub fn schedule(candidates: &Candidates, fast: bool) -> Vec<Plan> {
    let mut plans = vec![max_plan(candidates)];
    if fast {
        plans.push(min_plan(candidates));
    } else {
        plans.extend(intermediate_plans(candidates));
    }
    plans
}

/// The max plan with every observed passing minimum applied
pub fn confirmation_plan(max: &Plan, minimums: &BTreeMap<String, Version>) -> Plan {
    let mut versions = max.versions.clone();
    versions.extend(minimums.iter().map(|(k, v)| (k.clone(), v.clone())));
    Plan {
        title: MIN_TITLE.to_string(),
        versions,
        fatal: true,
        target: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn candidates(entries: &[(&str, &[&str])]) -> Candidates {
        Candidates::from_map(
            entries
                .iter()
                .map(|(name, versions)| (name.to_string(), versions.iter().map(|s| v(s)).collect()))
                .collect(),
        )
    }

    #[test]
    fn test_max_and_min() {
        let c = candidates(&[("a", &["1.0", "2.0"]), ("b", &["0.5"])]);
        let max = max_plan(&c);
        assert_eq!(max.title, "max");
        assert!(max.fatal);
        assert_eq!(max.pins(), vec!["a==2.0", "b==0.5"]);

        let min = min_plan(&c);
        assert_eq!(min.title, "min");
        assert!(min.fatal);
        assert_eq!(min.pins(), vec!["a==1.0", "b==0.5"]);
    }

    #[test]
    fn test_schedule_is_linear() {
        let c = candidates(&[("a", &["1", "2", "3"]), ("b", &["7"])]);
        let plans = schedule(&c, false);

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].title, "max");
        assert_eq!(plans[1].title, "a:1");
        assert_eq!(plans[2].title, "a:2");
        assert!(plans[1..].iter().all(|p| !p.fatal));
    }

    #[test]
    fn test_plan_count_formula() {
        let c = candidates(&[
            ("a", &["1", "2", "3", "4"]),
            ("b", &["1", "2", "3"]),
            ("c", &["1"]),
            ("d", &["1", "2"]),
        ]);
        let expected = 1 + c.iter().map(|(_, list)| list.len() - 1).sum::<usize>();
        assert_eq!(schedule(&c, false).len(), expected);
        assert_eq!(expected, 7);
    }

    #[test]
    fn test_intermediate_differs_in_one_package() {
        let c = candidates(&[("a", &["1", "2", "3"]), ("b", &["4", "5"]), ("c", &["6"])]);
        let max = max_plan(&c);

        for plan in intermediate_plans(&c) {
            let target = plan.target.clone().unwrap();
            let differing: Vec<&String> = plan
                .versions
                .iter()
                .filter(|(name, version)| max.versions[*name] != **version)
                .map(|(name, _)| name)
                .collect();
            assert_eq!(differing, vec![&target.name]);
            assert_eq!(plan.versions[&target.name], target.version);
            assert_eq!(plan.versions.len(), max.versions.len());
        }
    }

    #[test]
    fn test_fast_schedule() {
        let c = candidates(&[("a", &["1", "3"]), ("b", &["7"])]);
        let plans = schedule(&c, true);
        let titles: Vec<&str> = plans.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["max", "min"]);
        assert!(plans.iter().all(|p| p.fatal));
    }

    #[test]
    fn test_confirmation_plan() {
        let c = candidates(&[("a", &["1", "2", "3"]), ("b", &["4", "5"])]);
        let max = max_plan(&c);
        let mut minimums = BTreeMap::new();
        minimums.insert("a".to_string(), v("2"));

        let plan = confirmation_plan(&max, &minimums);
        assert_eq!(plan.title, "min");
        assert!(plan.fatal);
        assert!(plan.target.is_none());
        assert_eq!(plan.pins(), vec!["a==2", "b==5"]);
    }
}
