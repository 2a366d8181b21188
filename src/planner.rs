//! End-to-end planning run.
//!
//! `KextPlanner` glues the pieces together in the order a build uses them:
//!
//! 1. seed a fresh selection with the required kexts
//! 2. derive candidates from hardware facts (plus explicit names)
//! 3. run the compatibility gate once, asking the override collaborator only
//!    if something is out of window
//! 4. select every candidate through the resolver
//! 5. optionally apply a checklist edit ([`KextPlanner::reconcile`])
//! 6. linearize the selected kexts' bundles into load order
//!
//! The catalog and settings are borrowed for the planner's lifetime; every
//! [`Resolution`] owns its selection.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::catalog::KextCatalog;
use crate::config_file::PlannerSettings;
use crate::engine::bundle::BundleRecord;
use crate::engine::load_order::{LoadOrderLinearizer, ManifestEntry};
use crate::engine::manifest::{KernelAddEntry, OpenBounds, kernel_add};
use crate::error::Result;
use crate::hardware::HardwareFacts;
use crate::logic::candidates::candidate_kexts;
use crate::logic::compat::{Incompatibility, OverrideDecision, gate};
use crate::logic::resolver::DependencyResolver;
use crate::logic::selection::SelectionSet;
use crate::types::DarwinVersion;

/// Outcome of one selection run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub target: DarwinVersion,
    pub selection: SelectionSet,
    /// What the gate found out of window (empty if nothing was)
    pub incompatible: Vec<Incompatibility>,
    pub allow_unsupported: bool,
}

impl Resolution {
    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.is_selected(name)
    }

    /// Serializable view for CLI output.
    pub fn report(&self, catalog: &KextCatalog) -> ResolutionReport {
        ResolutionReport {
            target: self.target,
            selected: self
                .selection
                .names_in(catalog)
                .into_iter()
                .map(str::to_string)
                .collect(),
            snapshot: self.selection.snapshot(catalog),
            incompatible: self.incompatible.clone(),
            allow_unsupported: self.allow_unsupported,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub target: DarwinVersion,
    pub selected: Vec<String>,
    pub snapshot: BTreeMap<String, bool>,
    pub incompatible: Vec<Incompatibility>,
    pub allow_unsupported: bool,
}

/// Runs selection and load ordering against one catalog.
#[derive(Debug, Clone)]
pub struct KextPlanner<'a> {
    catalog: &'a KextCatalog,
    settings: &'a PlannerSettings,
}

impl<'a> KextPlanner<'a> {
    pub fn new(catalog: &'a KextCatalog, settings: &'a PlannerSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn catalog(&self) -> &'a KextCatalog {
        self.catalog
    }

    /// Select `candidates` on a fresh selection.
    pub fn resolve<S: AsRef<str>>(
        &self,
        candidates: &[S],
        target: DarwinVersion,
        decision: &dyn OverrideDecision,
    ) -> Resolution {
        let (incompatible, allow_unsupported) = gate(self.catalog, candidates, target, decision);

        let mut resolver = DependencyResolver::new(self.catalog);
        resolver.select_all(candidates, target, allow_unsupported);

        let selection = resolver.into_selection();
        info!(selected = selection.len(), "Resolved kext selection for Darwin {}", target);

        Resolution {
            target,
            selection,
            incompatible,
            allow_unsupported,
        }
    }

    /// Hardware-derived candidates followed by `extra` names.
    pub fn resolve_hardware<S: AsRef<str>>(
        &self,
        facts: &HardwareFacts,
        extra: &[S],
        target: DarwinVersion,
        decision: &dyn OverrideDecision,
    ) -> Resolution {
        let mut candidates = candidate_kexts(facts, target);
        for name in extra {
            let name = name.as_ref();
            if !candidates.iter().any(|c| c == name) {
                candidates.push(name.to_string());
            }
        }
        self.resolve(&candidates, target, decision)
    }

    /// Apply a checklist edit to an existing resolution.
    ///
    /// Only the names that were not selected yet go through the gate; the
    /// override answer covers the whole edit.
    pub fn reconcile<S: AsRef<str>>(
        &self,
        resolution: Resolution,
        checked: &[S],
        decision: &dyn OverrideDecision,
    ) -> Resolution {
        let target = resolution.target;
        let mut resolver = DependencyResolver::with_selection(self.catalog, resolution.selection);

        let newly = resolver.newly_checked(checked);
        let (incompatible, allow_unsupported) = gate(self.catalog, &newly, target, decision);

        resolver.reconcile(checked, target, allow_unsupported);

        Resolution {
            target,
            selection: resolver.into_selection(),
            incompatible,
            allow_unsupported,
        }
    }

    /// Linearizer configured from the settings.
    pub fn linearizer(&self, target: DarwinVersion) -> LoadOrderLinearizer<'a> {
        LoadOrderLinearizer::new(self.catalog, target)
            .with_cycle_policy(self.settings.cycle_policy)
            .with_variant_rules(&self.settings.variant_rules)
            .with_suppression_rules(&self.settings.suppression_rules)
            .with_adjustments(&self.settings.bound_adjustments)
    }

    /// Order the bundles of a resolution.
    pub fn plan(&self, resolution: &Resolution, records: Vec<BundleRecord>) -> Result<Vec<ManifestEntry>> {
        self.linearizer(resolution.target)
            .linearize(records, &resolution.selection)
    }

    /// `Kernel -> Add` entries for a load order.
    pub fn kernel_add(&self, entries: &[ManifestEntry]) -> Vec<KernelAddEntry> {
        kernel_add(entries, OpenBounds::of(self.catalog), &self.settings.comment)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::KextDescriptor;
    use crate::logic::compat::{AllowUnsupported, DenyUnsupported};
    use crate::types::VersionBounds;
    use std::cell::Cell;

    fn v(s: &str) -> DarwinVersion {
        s.parse().unwrap()
    }

    fn kext(name: &str, requires: &[&str], group: Option<&str>) -> KextDescriptor {
        KextDescriptor {
            name: name.to_string(),
            description: String::new(),
            category: "Test".to_string(),
            required: false,
            min_version: v("17.0.0"),
            max_version: v("25.99.99"),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            conflict_group: group.map(str::to_string),
        }
    }

    fn test_catalog() -> KextCatalog {
        let mut a = kext("A", &[], None);
        a.required = true;
        let mut d = kext("D", &[], None);
        d.min_version = v("19.0.0");
        d.max_version = v("20.99.99");
        KextCatalog::new(
            vec![a, kext("B", &["A"], Some("G")), kext("C", &[], Some("G")), d],
            VersionBounds::new(v("17.0.0"), v("25.99.99")),
            "A",
        )
        .unwrap()
    }

    #[test]
    fn test_scenario_conflict_group() {
        let catalog = test_catalog();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let first = planner.resolve(&["B"], v("22.0.0"), &DenyUnsupported);
        assert!(first.is_selected("A"));
        assert!(first.is_selected("B"));

        let second = planner.reconcile(first, &["A", "B", "C"], &DenyUnsupported);
        assert!(second.is_selected("A"));
        assert!(second.is_selected("C"));
        assert!(!second.is_selected("B"));
    }

    #[test]
    fn test_scenario_gate_declined() {
        let catalog = test_catalog();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let asked = Cell::new(0);
        let decline = |_: &[Incompatibility], _: DarwinVersion| {
            asked.set(asked.get() + 1);
            false
        };
        let resolution = planner.resolve(&["D"], v("21.0.0"), &decline);
        assert_eq!(asked.get(), 1);
        assert!(!resolution.is_selected("D"));
        assert_eq!(resolution.incompatible.len(), 1);
        assert!(!resolution.allow_unsupported);
    }

    #[test]
    fn test_scenario_gate_accepted() {
        let catalog = test_catalog();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let resolution = planner.resolve(&["D"], v("21.0.0"), &AllowUnsupported);
        assert!(resolution.is_selected("D"));
        assert!(resolution.allow_unsupported);
    }

    #[test]
    fn test_reconcile_only_gates_new_names() {
        let catalog = test_catalog();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let forced = planner.resolve(&["D"], v("21.0.0"), &AllowUnsupported);
        assert!(forced.is_selected("D"));

        let asked = Cell::new(false);
        let ask = |_: &[Incompatibility], _: DarwinVersion| {
            asked.set(true);
            false
        };
        let edited = planner.reconcile(forced, &["A", "D", "C"], &ask);
        assert!(!asked.get(), "D was already selected, C is in window");
        assert!(edited.is_selected("D"));
        assert!(edited.is_selected("C"));
    }

    #[test]
    fn test_resolve_hardware_merges_extra_names() {
        let catalog = KextCatalog::builtin();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let resolution = planner.resolve_hardware(
            &HardwareFacts::default(),
            &["AirportItlwm", "UTBDefault"],
            v("23.0.0"),
            &DenyUnsupported,
        );
        assert!(resolution.is_selected("Lilu"));
        assert!(resolution.is_selected("UTBDefault"));
        assert!(resolution.is_selected("USBToolBox"), "pulled in by UTBDefault");
        assert!(resolution.is_selected("AirportItlwm"));
    }

    #[test]
    fn test_plan_uses_settings() {
        let catalog = KextCatalog::builtin();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let resolution = planner.resolve(&["AirportItlwm"], v("23.5.0"), &DenyUnsupported);
        let records = vec![
            BundleRecord::new("Lilu.kext", "as.vit9696.Lilu"),
            BundleRecord::new("AirportItlwm23.0/AirportItlwm.kext", "com.zxystd.AirportItlwm"),
            BundleRecord::new("AirportItlwm23.4/AirportItlwm.kext", "com.zxystd.AirportItlwm"),
            BundleRecord::new("NVMeFix.kext", "com.acidanthera.NVMeFix"),
        ];

        let entries = planner.plan(&resolution, records).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Lilu.kext", "AirportItlwm23.4/AirportItlwm.kext"]);

        let add = planner.kernel_add(&entries);
        assert_eq!(add[0].comment, " | kextplan");
        assert_eq!(add[0].min_kernel, "");
        assert_eq!(add[1].min_kernel, "23.0.0");
        assert_eq!(add[1].max_kernel, "23.99.99");
    }

    #[test]
    fn test_report_lists_catalog_order() {
        let catalog = test_catalog();
        let settings = PlannerSettings::default();
        let planner = KextPlanner::new(&catalog, &settings);

        let resolution = planner.resolve(&["C"], v("22.0.0"), &DenyUnsupported);
        let report = resolution.report(&catalog);
        assert_eq!(report.selected, vec!["A", "C"]);
        assert_eq!(report.snapshot.len(), 4);
        assert_eq!(report.snapshot.get("B"), Some(&false));
    }
}
