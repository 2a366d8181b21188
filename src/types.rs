//! Core value types shared by the catalog, resolver and load-order engine.
//!
//! Darwin versions are kept as numeric triples rather than strings so that
//! every window comparison is a plain integer comparison: `"9.0.0"` sorts
//! below `"10.0.0"` here, which a string compare would get wrong.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::error::KextPlanError;

/// A Darwin kernel version (`major.minor.patch`).
///
/// Ordering is component-wise on the integers, major first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DarwinVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DarwinVersion {
    /// Build a version from its three components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The same version with its major component replaced.
    pub const fn with_major(self, major: u32) -> Self {
        Self { major, ..self }
    }
}

impl FromStr for DarwinVersion {
    type Err = KextPlanError;

    /// Parse `"NN"`, `"NN.NN"` or `"NN.NN.NN"`. Missing components are 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(KextPlanError::invalid_version(s, "empty version string"));
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 3 {
            return Err(KextPlanError::invalid_version(
                s,
                "expected at most three components",
            ));
        }

        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                KextPlanError::invalid_version(s, format!("component '{}' is not a number", part))
            })?;
        }

        Ok(Self::new(components[0], components[1], components[2]))
    }
}

impl TryFrom<String> for DarwinVersion {
    type Error = KextPlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DarwinVersion> for String {
    fn from(value: DarwinVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DarwinVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Inclusive `[min, max]` Darwin support window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionBounds {
    pub min: DarwinVersion,
    pub max: DarwinVersion,
}

impl VersionBounds {
    pub const fn new(min: DarwinVersion, max: DarwinVersion) -> Self {
        Self { min, max }
    }

    /// True iff `min <= version <= max`.
    pub fn contains(&self, version: DarwinVersion) -> bool {
        self.min <= version && version <= self.max
    }

    /// Tighten these bounds against another window.
    pub fn narrow(self, other: VersionBounds) -> Self {
        Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// An empty window (`min > max`), which narrowing can produce.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl fmt::Display for VersionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

/// What the load-order engine does when declared library dependencies form a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fail the run with `KextPlanError::DependencyCycle`
    #[default]
    Reject,
    /// Ignore the back edge and keep going (no narrowing through it)
    Break,
}
