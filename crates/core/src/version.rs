//! Three-part semantic versions for note type schemas.
//!
//! Versions order numerically per component (`1.10.0` is newer than `1.9.3`)
//! and two versions are compatible when they share a major component.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced while parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,

    #[error("version '{0}' must have exactly three parts (major.minor.patch)")]
    WrongArity(String),

    #[error("version '{version}' has a non-numeric component '{part}'")]
    NonNumeric { version: String, part: String },
}

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a version string. A single leading `v` is tolerated.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::WrongArity(input.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionError::NonNumeric {
                version: input.to_string(),
                part: (*part).to_string(),
            })?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    /// Whether both versions share the same major component.
    pub fn is_compatible_with(&self, other: &SemanticVersion) -> bool {
        self.major == other.major
    }

    /// The next minor version, or `None` when the minor component is at
    /// its maximum.
    pub fn bump_minor(&self) -> Option<Self> {
        Some(Self::new(self.major, self.minor.checked_add(1)?, 0))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(SemanticVersion::parse(a)?.cmp(&SemanticVersion::parse(b)?))
}

/// Compare two version strings, falling back to lexical order when either
/// side does not parse. Used where ordering must be total (sorting).
pub fn compare_versions_lenient(a: &str, b: &str) -> Ordering {
    match (SemanticVersion::parse(a), SemanticVersion::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Whether two version strings share a major component.
pub fn is_compatible(a: &str, b: &str) -> Result<bool, VersionError> {
    Ok(SemanticVersion::parse(a)?.is_compatible_with(&SemanticVersion::parse(b)?))
}
