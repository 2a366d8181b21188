//! Planner settings file.
//!
//! Everything that tunes a run without changing the catalog lives here: cycle
//! policy, the manifest comment, and the three rule tables the load-order pass
//! consults. `PlannerSettings::default()` carries the stock rules, so an empty
//! JSON object `{}` is a valid settings file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::load_order::{
    BundleAdjustment, SuppressionRule, stock_bound_adjustments, stock_suppression_rules,
};
use crate::engine::manifest::DEFAULT_COMMENT;
use crate::engine::variants::{Condition, VariantRule, stock_rules};
use crate::types::CyclePolicy;

/// Settings that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub cycle_policy: CyclePolicy,
    /// `Comment` written on every `Kernel -> Add` entry
    pub comment: String,
    pub variant_rules: Vec<VariantRule>,
    pub suppression_rules: Vec<SuppressionRule>,
    pub bound_adjustments: Vec<BundleAdjustment>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            cycle_policy: CyclePolicy::default(),
            comment: DEFAULT_COMMENT.to_string(),
            variant_rules: stock_rules(),
            suppression_rules: stock_suppression_rules(),
            bound_adjustments: stock_bound_adjustments(),
        }
    }
}

impl PlannerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        for rule in &self.variant_rules {
            if rule.driver.trim().is_empty() {
                bail!("Variant rule must name a driver");
            }
            for choice in &rule.choices {
                if choice.suffix.trim().is_empty() {
                    bail!("Variant choice for '{}' has an empty suffix", rule.driver);
                }
                validate_condition(&choice.when)
                    .with_context(|| format!("Invalid condition in variant rule for '{}'", rule.driver))?;
            }
        }

        for (i, rule) in self.suppression_rules.iter().enumerate() {
            if rule.suppress.is_empty() {
                bail!("Suppression rule #{} suppresses nothing", i + 1);
            }
            if rule.suppress.iter().any(|s| s.trim().is_empty()) {
                bail!("Suppression rule #{} contains an empty bundle name", i + 1);
            }
            validate_condition(&rule.when)
                .with_context(|| format!("Invalid condition in suppression rule #{}", i + 1))?;
        }

        for adjustment in &self.bound_adjustments {
            if adjustment.bundle.trim().is_empty() {
                bail!("Bound adjustment must name a bundle");
            }
        }

        Ok(())
    }
}

fn validate_condition(condition: &Condition) -> Result<()> {
    match condition {
        Condition::TargetAtLeast(_) => Ok(()),
        Condition::AllSelected(names) => {
            if names.is_empty() {
                bail!("all_selected needs at least one kext name");
            }
            Ok(())
        }
        Condition::Any(conditions) => {
            if conditions.is_empty() {
                bail!("any needs at least one condition");
            }
            conditions.iter().try_for_each(validate_condition)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::load_order::BoundAdjustment;
    use crate::engine::variants::VariantChoice;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_carries_stock_rules() {
        let settings = PlannerSettings::default();
        assert_eq!(settings.cycle_policy, CyclePolicy::Reject);
        assert_eq!(settings.comment, " | kextplan");
        assert_eq!(settings.variant_rules[0].driver, "AirportItlwm");
        assert_eq!(settings.suppression_rules.len(), 4);
        assert_eq!(settings.bound_adjustments.len(), 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let settings: PlannerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PlannerSettings::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{ "cycle_policy": "break", "suppression_rules": [] }"#)
            .unwrap();
        temp_file.flush().unwrap();

        let settings = PlannerSettings::load_from_file(temp_file.path()).unwrap();
        assert_eq!(settings.cycle_policy, CyclePolicy::Break);
        assert!(settings.suppression_rules.is_empty());
        assert_eq!(settings.variant_rules, stock_rules());
    }

    #[test]
    fn test_save_and_load() {
        let mut settings = PlannerSettings::default();
        settings.comment = " | custom".to_string();
        settings.bound_adjustments.push(BundleAdjustment {
            bundle: "Foo".to_string(),
            adjustment: BoundAdjustment::PinMajorToTarget,
        });

        let temp_file = NamedTempFile::new().unwrap();
        settings.save_to_file(temp_file.path()).unwrap();
        let loaded = PlannerSettings::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = PlannerSettings::load_from_file(Path::new("/nonexistent/path"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{ invalid json }").unwrap();
        temp_file.flush().unwrap();

        assert!(PlannerSettings::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_unknown_cycle_policy() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(br#"{ "cycle_policy": "ignore" }"#).unwrap();
        temp_file.flush().unwrap();

        assert!(PlannerSettings::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_validation_empty_suffix() {
        let mut settings = PlannerSettings::default();
        settings.variant_rules.push(VariantRule {
            driver: "Foo".to_string(),
            choices: vec![VariantChoice {
                when: Condition::TargetAtLeast(crate::types::DarwinVersion::new(22, 0, 0)),
                suffix: " ".to_string(),
            }],
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_empty_condition() {
        let mut settings = PlannerSettings::default();
        settings.suppression_rules.push(SuppressionRule {
            when: Condition::Any(vec![]),
            suppress: vec!["Foo".to_string()],
        });
        let err = settings.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("suppression rule #5"));
    }

    #[test]
    fn test_validation_empty_suppression() {
        let mut settings = PlannerSettings::default();
        settings.suppression_rules[0].suppress.clear();
        assert!(settings.validate().is_err());
    }
}
