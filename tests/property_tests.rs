//! Property-Based Tests for kextplan
//!
//! Uses proptest to check the selection and load-order invariants:
//! - Conflict groups never have two members selected
//! - Required kexts stay selected and selections stay closed over `requires`
//! - `select` is idempotent
//! - Load order is topological, bounds only narrow, and identifiers are
//!   enabled exactly once

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use kextplan::catalog::{KextCatalog, KextDescriptor};
use kextplan::engine::bundle::BundleRecord;
use kextplan::engine::load_order::LoadOrderLinearizer;
use kextplan::logic::compat::in_window;
use kextplan::logic::resolver::DependencyResolver;
use kextplan::logic::selection::SelectionSet;
use kextplan::types::{DarwinVersion, VersionBounds};

// =============================================================================
// Resolver Properties
// =============================================================================

fn builtin_names() -> Vec<String> {
    KextCatalog::builtin().iter().map(|k| k.name.clone()).collect()
}

/// Catalog names plus a couple of names the catalog does not know.
fn name_strategy() -> impl Strategy<Value = String> {
    let mut names = builtin_names();
    names.push("NotAKext".to_string());
    names.push("lilu".to_string());
    prop::sample::select(names)
}

fn target_strategy() -> impl Strategy<Value = DarwinVersion> {
    (17u32..=25, 0u32..=6).prop_map(|(major, minor)| DarwinVersion::new(major, minor, 0))
}

fn run_selects(names: &[String], target: DarwinVersion, allow: bool) -> SelectionSet {
    let catalog = KextCatalog::builtin();
    let mut resolver = DependencyResolver::new(&catalog);
    resolver.select_all(names, target, allow);
    resolver.into_selection()
}

proptest! {
    /// At most one member of every conflict group is selected.
    #[test]
    fn conflict_groups_stay_exclusive(
        names in prop::collection::vec(name_strategy(), 0..30),
        target in target_strategy(),
        allow in any::<bool>(),
    ) {
        let catalog = KextCatalog::builtin();
        let selection = run_selects(&names, target, allow);

        let mut per_group: HashMap<&str, Vec<&str>> = HashMap::new();
        for kext in catalog.iter().filter(|k| selection.is_selected(&k.name)) {
            if let Some(group) = kext.conflict_group.as_deref() {
                per_group.entry(group).or_default().push(kext.name.as_str());
            }
        }
        for (group, members) in per_group {
            prop_assert!(members.len() <= 1, "group {} has {:?}", group, members);
        }
    }

    /// Required kexts stay selected; selected kexts have their requirements,
    /// except requirements the gate kept out.
    #[test]
    fn selection_is_closed(
        names in prop::collection::vec(name_strategy(), 0..30),
        target in target_strategy(),
        allow in any::<bool>(),
    ) {
        let catalog = KextCatalog::builtin();
        let selection = run_selects(&names, target, allow);

        for kext in catalog.required() {
            prop_assert!(selection.is_selected(&kext.name));
        }

        for kext in catalog.iter().filter(|k| selection.is_selected(&k.name)) {
            for required in &kext.requires {
                let Some(dep) = catalog.get(required) else { continue };
                let gated = !allow && !in_window(dep, target);
                prop_assert!(
                    gated || selection.is_selected(required),
                    "{} selected without {}", kext.name, required
                );
            }
        }
    }

    /// Selecting the same name twice equals selecting it once.
    #[test]
    fn select_is_idempotent(
        names in prop::collection::vec(name_strategy(), 0..20),
        again in name_strategy(),
        target in target_strategy(),
        allow in any::<bool>(),
    ) {
        let catalog = KextCatalog::builtin();
        let mut resolver = DependencyResolver::new(&catalog);
        resolver.select_all(&names, target, allow);

        resolver.select(&again, target, allow);
        let once = resolver.selection().clone();
        resolver.select(&again, target, allow);

        prop_assert_eq!(&once, resolver.selection());
    }

    /// Without override, nothing outside its window gets selected by a
    /// direct request.
    #[test]
    fn gate_blocks_out_of_window(name in name_strategy(), target in target_strategy()) {
        let catalog = KextCatalog::builtin();
        let selection = run_selects(std::slice::from_ref(&name), target, false);
        if let Some(kext) = catalog.get(&name) {
            if !kext.required && !in_window(kext, target) {
                prop_assert!(!selection.is_selected(&name));
            }
        }
    }
}

// =============================================================================
// Load-Order Properties
// =============================================================================

/// A random DAG: node `i` may depend on any node `j < i`.
#[derive(Debug, Clone)]
struct Dag {
    windows: Vec<(u32, u32)>,
    deps: Vec<Vec<usize>>,
    order: Vec<usize>,
}

fn dag_strategy() -> impl Strategy<Value = Dag> {
    (1usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec((17u32..=25, 0u32..=8), n),
            prop::collection::vec(prop::collection::vec(any::<bool>(), n), n),
            Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
        )
            .prop_map(|(spans, matrix, order)| Dag {
                windows: spans
                    .into_iter()
                    .map(|(min, span)| (min, (min + span).min(25)))
                    .collect(),
                deps: matrix
                    .iter()
                    .enumerate()
                    .map(|(i, row)| (0..i).filter(|&j| row[j]).collect())
                    .collect(),
                order,
            })
    })
}

impl Dag {
    fn window(&self, i: usize) -> VersionBounds {
        let (min, max) = self.windows[i];
        VersionBounds::new(DarwinVersion::new(min, 0, 0), DarwinVersion::new(max, 99, 99))
    }

    fn catalog(&self) -> KextCatalog {
        let kexts = (0..self.windows.len())
            .map(|i| {
                let window = self.window(i);
                KextDescriptor {
                    name: format!("K{}", i),
                    description: String::new(),
                    category: "Test".to_string(),
                    required: false,
                    min_version: window.min,
                    max_version: window.max,
                    requires: Vec::new(),
                    conflict_group: None,
                }
            })
            .collect();
        KextCatalog::new(
            kexts,
            VersionBounds::new(DarwinVersion::new(17, 0, 0), DarwinVersion::new(25, 99, 99)),
            "K0",
        )
        .unwrap()
    }

    fn records(&self) -> Vec<BundleRecord> {
        self.order
            .iter()
            .map(|&i| {
                BundleRecord::new(format!("K{}.kext", i), format!("id{}", i))
                    .with_libraries(self.deps[i].iter().map(|j| format!("id{}", j)))
            })
            .collect()
    }
}

proptest! {
    /// Every bundle follows its libraries; every bundle's bounds sit inside
    /// its own window and its libraries' effective bounds.
    #[test]
    fn load_order_is_topological_and_narrowing(dag in dag_strategy()) {
        let catalog = dag.catalog();
        let selection: SelectionSet = catalog.iter().map(|k| k.name.clone()).collect();
        let entries = LoadOrderLinearizer::new(&catalog, DarwinVersion::new(22, 0, 0))
            .linearize(dag.records(), &selection)
            .unwrap();

        prop_assert_eq!(entries.len(), dag.windows.len());

        let position: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.identifier.as_str(), pos))
            .collect();

        for (i, deps) in dag.deps.iter().enumerate() {
            let id = format!("id{}", i);
            let me = &entries[position[id.as_str()]];
            let own = dag.window(i);
            prop_assert!(me.effective_min >= own.min);
            prop_assert!(me.effective_max <= own.max);

            for &j in deps {
                let dep_id = format!("id{}", j);
                let dep = &entries[position[dep_id.as_str()]];
                prop_assert!(position[dep_id.as_str()] < position[id.as_str()]);
                prop_assert!(me.effective_min >= dep.effective_min);
                prop_assert!(me.effective_max <= dep.effective_max);
            }
        }
    }

    /// With repeated identifiers, each identifier is enabled exactly once and
    /// that is its first emitted entry.
    #[test]
    fn duplicate_identifiers_enabled_once(ids in prop::collection::vec(0usize..5, 1..15)) {
        let catalog = KextCatalog::new(
            Vec::new(),
            VersionBounds::new(DarwinVersion::new(17, 0, 0), DarwinVersion::new(25, 99, 99)),
            "Lilu",
        )
        .unwrap();
        let records: Vec<BundleRecord> = ids
            .iter()
            .enumerate()
            .map(|(n, id)| BundleRecord::new(format!("copy{}/B{}.kext", n, id), format!("id{}", id)))
            .collect();

        let entries = LoadOrderLinearizer::new(&catalog, DarwinVersion::new(22, 0, 0))
            .linearize(records, &SelectionSet::new())
            .unwrap();

        prop_assert_eq!(entries.len(), ids.len());
        let mut seen = HashSet::new();
        for entry in &entries {
            let first = seen.insert(entry.identifier.clone());
            prop_assert_eq!(entry.enabled, first);
        }
    }

    /// Version strings with one to three numeric parts always parse and
    /// render as a full triple.
    #[test]
    fn version_parse_pads_components(parts in prop::collection::vec(0u32..100, 1..=3)) {
        let text = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(".");
        let version: DarwinVersion = text.parse().unwrap();
        prop_assert_eq!(version.major, parts[0]);
        prop_assert_eq!(version.to_string().split('.').count(), 3);
    }

    /// Arbitrary input never panics the version parser.
    #[test]
    fn version_parse_doesnt_crash(s in ".*") {
        let _ = s.parse::<DarwinVersion>();
    }
}
