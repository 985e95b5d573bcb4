//! Version identifiers and the versioned rule store.
//!
//! Rule sets are identified by `"<major>.<minor>.<patch>_<date>"` strings
//! (for example `1.2.0_20240601`); rule files on disk are named
//! `v1.2.0_20240601.yaml`. Ordering is semantic-version precedence first,
//! then the date suffix as a tiebreaker, so "latest" selection is
//! deterministic for any fixed set of versions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::ast::RuleSet;
use crate::error::{Result, RuleParseError};

/// A parsed rule-set version identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionId {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Date suffix (`yyyymmdd`), compared numerically after the semver triple.
    pub date: u64,
}

impl VersionId {
    /// Parse a version string like `"1.2.0_20240601"`.
    ///
    /// A leading `v` is accepted so file stems (`v1.2.0_20240601`) parse
    /// directly.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('v').unwrap_or(s);
        let (semver, date_str) = trimmed
            .split_once('_')
            .ok_or_else(|| RuleParseError::InvalidVersion(s.to_string()))?;

        let mut parts = semver.split('.');
        let mut next_num = || -> Result<u64> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| RuleParseError::InvalidVersion(s.to_string()))
        };
        let major = next_num()?;
        let minor = next_num()?;
        let patch = next_num()?;
        if parts.next().is_some() {
            return Err(RuleParseError::InvalidVersion(s.to_string()));
        }

        let date = date_str
            .parse()
            .map_err(|_| RuleParseError::InvalidVersion(s.to_string()))?;

        Ok(VersionId {
            major,
            minor,
            patch,
            date,
        })
    }
}

impl FromStr for VersionId {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self> {
        VersionId::parse(s)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}_{}",
            self.major, self.minor, self.patch, self.date
        )
    }
}

/// A collection of rule sets keyed by version.
///
/// The store is immutable once loaded; exactly one version is active per
/// validation run (explicit selection, or the highest available).
#[derive(Debug, Default)]
pub struct RuleStore {
    versions: BTreeMap<VersionId, RuleSet>,
}

impl RuleStore {
    pub fn new() -> Self {
        RuleStore {
            versions: BTreeMap::new(),
        }
    }

    /// Insert a rule set under its own version id.
    pub fn insert(&mut self, rule_set: RuleSet) {
        self.versions.insert(rule_set.version.clone(), rule_set);
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// All available versions in precedence order (lowest first).
    pub fn versions(&self) -> impl Iterator<Item = &VersionId> {
        self.versions.keys()
    }

    pub fn get(&self, version: &VersionId) -> Option<&RuleSet> {
        self.versions.get(version)
    }

    /// The highest available version, if any.
    pub fn latest(&self) -> Option<&RuleSet> {
        self.versions.values().next_back()
    }

    /// Resolve the active rule set: an explicit version id, or the latest.
    ///
    /// Errors when the store is empty or the explicit id is unknown.
    pub fn select(&self, explicit: Option<&str>) -> Result<&RuleSet> {
        match explicit {
            Some(id) => {
                let version = VersionId::parse(id)?;
                self.versions.get(&version).ok_or_else(|| {
                    RuleParseError::InvalidVersion(format!("unknown version '{id}'"))
                })
            }
            None => self
                .latest()
                .ok_or_else(|| RuleParseError::InvalidVersion("no versions available".into())),
        }
    }
}
