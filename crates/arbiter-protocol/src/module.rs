//! Closed sets: downstream modules, caller kinds, and semantic versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A downstream processing module the authority can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleId {
    Oracle,
    Muse,
    Scribe,
}

impl ModuleId {
    pub const ALL: [ModuleId; 3] = [ModuleId::Oracle, ModuleId::Muse, ModuleId::Scribe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "ORACLE",
            Self::Muse => "MUSE",
            Self::Scribe => "SCRIBE",
        }
    }

    /// Module whose completed call must exist in the session before this one runs.
    pub fn prerequisite(&self) -> Option<ModuleId> {
        match self {
            Self::Muse => Some(Self::Oracle),
            Self::Oracle | Self::Scribe => None,
        }
    }

    pub fn requires_seed(&self) -> bool {
        matches!(self, Self::Muse)
    }

    /// Per-module action whitelist.
    pub fn allowed_actions(&self) -> &'static [&'static str] {
        match self {
            Self::Oracle => &["analyze", "classify", "summarize"],
            Self::Muse => &["suggest", "compose", "remix"],
            Self::Scribe => &["format", "render", "transcribe"],
        }
    }

    pub fn allows_action(&self, action: &str) -> bool {
        self.allowed_actions().contains(&action)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value `{value}`, expected one of: {expected}")]
pub struct UnknownVariant {
    pub value: String,
    pub expected: String,
}

impl FromStr for ModuleId {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|module| module.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                value: s.to_owned(),
                expected: join_names(Self::ALL.iter().map(ModuleId::as_str)),
            })
    }
}

/// Who is calling the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerKind {
    Human,
    Agent,
    System,
}

impl CallerKind {
    pub const ALL: [CallerKind; 3] = [CallerKind::Human, CallerKind::Agent, CallerKind::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl fmt::Display for CallerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|caller| caller.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                value: s.to_owned(),
                expected: join_names(Self::ALL.iter().map(CallerKind::as_str)),
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// `major.minor.patch` version of a module or adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version `{0}`, expected major.minor.patch")]
pub struct InvalidVersion(pub String);

impl SemVer {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Same major, and at least the requested minor/patch.
    pub fn satisfies(&self, requested: &SemVer) -> bool {
        self.major == requested.major
            && (self.minor, self.patch) >= (requested.minor, requested.patch)
    }
}

impl FromStr for SemVer {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion(s.to_owned());
        let mut parts = s.split('.');
        let mut next = || -> Result<u64, InvalidVersion> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let version = SemVer::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl TryFrom<String> for SemVer {
    type Error = InvalidVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemVer> for String {
    fn from(value: SemVer) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_parses_only_closed_set() {
        assert_eq!("ORACLE".parse::<ModuleId>(), Ok(ModuleId::Oracle));
        let err = "oracle".parse::<ModuleId>().unwrap_err();
        assert!(err.expected.contains("MUSE"));
    }

    #[test]
    fn module_id_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&ModuleId::Scribe).unwrap(), "\"SCRIBE\"");
        assert_eq!(serde_json::to_string(&CallerKind::Agent).unwrap(), "\"agent\"");
    }

    #[test]
    fn only_muse_has_a_prerequisite() {
        assert_eq!(ModuleId::Muse.prerequisite(), Some(ModuleId::Oracle));
        assert!(ModuleId::Oracle.prerequisite().is_none());
        assert!(ModuleId::Muse.requires_seed());
    }

    #[test]
    fn action_whitelist_is_per_module() {
        assert!(ModuleId::Oracle.allows_action("analyze"));
        assert!(!ModuleId::Oracle.allows_action("suggest"));
        assert!(ModuleId::Muse.allows_action("suggest"));
    }

    #[test]
    fn semver_parse_rejects_malformed() {
        assert_eq!("1.2.3".parse::<SemVer>(), Ok(SemVer::new(1, 2, 3)));
        for bad in ["1.2", "1.2.3.4", "v1.2.3", "1..3", "1.2.x", "", "1.2.-3"] {
            assert!(bad.parse::<SemVer>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn semver_satisfies_same_major_and_not_older() {
        let available = SemVer::new(1, 2, 0);
        assert!(available.satisfies(&SemVer::new(1, 1, 9)));
        assert!(available.satisfies(&SemVer::new(1, 2, 0)));
        assert!(!available.satisfies(&SemVer::new(1, 2, 1)));
        assert!(!available.satisfies(&SemVer::new(2, 0, 0)));
        assert!(!available.satisfies(&SemVer::new(0, 9, 0)));
    }

    #[test]
    fn semver_serde_uses_string_form() {
        let json = serde_json::to_string(&SemVer::new(0, 9, 1)).unwrap();
        assert_eq!(json, "\"0.9.1\"");
        let back: SemVer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemVer::new(0, 9, 1));
    }
}
