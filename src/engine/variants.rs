//! Variant selection: pick one of several builds of the same driver.
//!
//! Some drivers ship one bundle per macOS release, kept side by side under
//! tagged directories (`AirportItlwm22/`, `AirportItlwm23.4/` ...). A
//! [`VariantRule`] maps the target version and the current selection to the
//! tag that must appear in the bundle path; every other build is dropped
//! before load-order traversal.
//!
//! Rules are plain data (serde), so new drivers with variants are added in the
//! settings file rather than in code.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bundle::BundleRecord;
use crate::logic::selection::SelectionSet;
use crate::types::DarwinVersion;

/// A predicate over the target version and the selection.
///
/// Serialized externally tagged: `{"target_at_least": "23.4.0"}`,
/// `{"all_selected": ["IOSkywalkFamily", "IO80211FamilyLegacy"]}`,
/// `{"any": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    TargetAtLeast(DarwinVersion),
    AllSelected(Vec<String>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn holds(&self, target: DarwinVersion, selection: &SelectionSet) -> bool {
        match self {
            Self::TargetAtLeast(version) => target >= *version,
            Self::AllSelected(names) => names.iter().all(|n| selection.is_selected(n)),
            Self::Any(conditions) => conditions.iter().any(|c| c.holds(target, selection)),
        }
    }

    pub fn selected(names: &[&str]) -> Self {
        Self::AllSelected(names.iter().map(|n| n.to_string()).collect())
    }
}

/// One branch of a variant rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantChoice {
    pub when: Condition,
    /// Substring the chosen bundle's path must contain
    pub suffix: String,
}

/// Variant mapping for one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRule {
    /// Bundle stem of the driver (e.g. `AirportItlwm`)
    pub driver: String,
    /// Checked in order; the first that holds wins
    pub choices: Vec<VariantChoice>,
}

impl VariantRule {
    /// The tag to keep. Falls back to the target's major version.
    pub fn choose(&self, target: DarwinVersion, selection: &SelectionSet) -> String {
        self.choices
            .iter()
            .find(|c| c.when.holds(target, selection))
            .map(|c| c.suffix.clone())
            .unwrap_or_else(|| target.major.to_string())
    }

    pub fn applies_to(&self, record: &BundleRecord) -> bool {
        record.stem() == self.driver
    }
}

/// Drop every build of a ruled driver whose path lacks the chosen tag.
pub fn apply_variant_rules(
    records: Vec<BundleRecord>,
    rules: &[VariantRule],
    target: DarwinVersion,
    selection: &SelectionSet,
) -> Vec<BundleRecord> {
    if rules.is_empty() {
        return records;
    }

    let chosen: Vec<(&VariantRule, String)> = rules
        .iter()
        .map(|rule| (rule, rule.choose(target, selection)))
        .collect();

    records
        .into_iter()
        .filter(|record| {
            chosen.iter().all(|(rule, suffix)| {
                let keep = !rule.applies_to(record) || record.path.contains(suffix.as_str());
                if !keep {
                    debug!(path = %record.path, variant = %suffix, "Dropping unused driver variant");
                }
                keep
            })
        })
        .collect()
}

/// Stock rules: AirportItlwm builds per macOS release.
pub fn stock_rules() -> Vec<VariantRule> {
    vec![VariantRule {
        driver: "AirportItlwm".to_string(),
        choices: vec![
            VariantChoice {
                when: Condition::Any(vec![
                    Condition::selected(&["IOSkywalkFamily", "IO80211FamilyLegacy"]),
                    Condition::TargetAtLeast(DarwinVersion::new(24, 0, 0)),
                ]),
                suffix: "22".to_string(),
            },
            VariantChoice {
                when: Condition::TargetAtLeast(DarwinVersion::new(23, 4, 0)),
                suffix: "23.4".to_string(),
            },
            VariantChoice {
                when: Condition::TargetAtLeast(DarwinVersion::new(23, 0, 0)),
                suffix: "23.0".to_string(),
            },
        ],
    }]
}
