//! Load-order linearizer.
//!
//! Turns the selected kexts' bundle records into the ordered `Kernel -> Add`
//! list: every bundle appears after the libraries it links against, carries
//! the tightest Darwin bounds of its dependency chain, and repeated bundle
//! identifiers are emitted disabled.
//!
//! # Pipeline
//!
//! | Step | Effect |
//! |------|--------|
//! | Selection filter | drop bundles whose outermost kext is an unselected catalog entry |
//! | Variants | keep one build per ruled driver ([`super::variants`]) |
//! | Suppression | drop plugin bundles made redundant by other selections |
//! | Identifier check | drop records without a bundle identifier |
//! | Traversal | post-order DFS over library identifiers, narrowing bounds |
//!
//! # Design
//!
//! - **Last record wins the index**: with duplicate identifiers, dependency
//!   edges resolve to the last record in input order
//! - **First record wins the slot**: the first emitted record per identifier
//!   is enabled, later ones are emitted disabled
//! - **Dangling edges are fine**: system libraries (`com.apple.*`) are never in
//!   the input and are skipped
//! - **Cycles**: rejected by default; [`CyclePolicy::Break`] ignores back edges

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::bundle::{BundleOwner, BundleRecord};
use super::variants::{Condition, VariantRule, apply_variant_rules};
use crate::catalog::KextCatalog;
use crate::error::{KextPlanError, Result};
use crate::logic::selection::SelectionSet;
use crate::types::{CyclePolicy, DarwinVersion, VersionBounds};

// ============================================================================
// Rules
// ============================================================================

/// Bundles to leave out entirely when a condition holds.
///
/// Rules form an `if / else if` chain: only the first rule whose condition
/// holds is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub when: Condition,
    /// Bundle stems (e.g. `VoodooPS2Mouse`)
    pub suppress: Vec<String>,
}

/// Post-narrowing fix-up of a bundle's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundAdjustment {
    /// Lower the upper bound to at most this version
    CapMax(DarwinVersion),
    /// Replace the major component of both bounds with the target's
    PinMajorToTarget,
}

impl BoundAdjustment {
    pub fn apply(self, bounds: VersionBounds, target: DarwinVersion) -> VersionBounds {
        match self {
            Self::CapMax(cap) => VersionBounds::new(bounds.min, bounds.max.min(cap)),
            Self::PinMajorToTarget => VersionBounds::new(
                bounds.min.with_major(target.major),
                bounds.max.with_major(target.major),
            ),
        }
    }
}

/// A [`BoundAdjustment`] bound to one bundle stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleAdjustment {
    pub bundle: String,
    pub adjustment: BoundAdjustment,
}

/// Stock suppression chain.
pub fn stock_suppression_rules() -> Vec<SuppressionRule> {
    fn rule(when: &[&str], suppress: &[&str]) -> SuppressionRule {
        SuppressionRule {
            when: Condition::selected(when),
            suppress: suppress.iter().map(|s| s.to_string()).collect(),
        }
    }

    vec![
        rule(&["IO80211ElCap"], &["AirPortBrcm4331", "AppleAirPortBrcm43224"]),
        rule(&["VoodooSMBus"], &["VoodooPS2Mouse"]),
        rule(&["VoodooRMI", "VoodooI2C"], &["VoodooSMBus", "RMISMBus", "VoodooI2CHID"]),
        rule(&["VoodooRMI"], &["RMII2C"]),
    ]
}

/// Stock bound adjustments.
pub fn stock_bound_adjustments() -> Vec<BundleAdjustment> {
    vec![
        BundleAdjustment {
            bundle: "AirPortBrcm4360_Injector".to_string(),
            adjustment: BoundAdjustment::CapMax(DarwinVersion::new(19, 99, 99)),
        },
        BundleAdjustment {
            bundle: "AirportItlwm".to_string(),
            adjustment: BoundAdjustment::PinMajorToTarget,
        },
    ]
}

// ============================================================================
// Output
// ============================================================================

/// One bundle in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub identifier: String,
    pub version: String,
    pub executable_path: String,
    pub plist_path: String,
    pub effective_min: DarwinVersion,
    pub effective_max: DarwinVersion,
    pub enabled: bool,
}

impl ManifestEntry {
    pub fn bounds(&self) -> VersionBounds {
        VersionBounds::new(self.effective_min, self.effective_max)
    }
}

// ============================================================================
// Linearizer
// ============================================================================

/// Configured load-order pass for one target.
#[derive(Debug, Clone)]
pub struct LoadOrderLinearizer<'a> {
    catalog: &'a KextCatalog,
    target: DarwinVersion,
    cycle_policy: CyclePolicy,
    variant_rules: &'a [VariantRule],
    suppression_rules: &'a [SuppressionRule],
    adjustments: &'a [BundleAdjustment],
}

impl<'a> LoadOrderLinearizer<'a> {
    /// No rules, no adjustments, cycles rejected.
    pub fn new(catalog: &'a KextCatalog, target: DarwinVersion) -> Self {
        Self {
            catalog,
            target,
            cycle_policy: CyclePolicy::default(),
            variant_rules: &[],
            suppression_rules: &[],
            adjustments: &[],
        }
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_variant_rules(mut self, rules: &'a [VariantRule]) -> Self {
        self.variant_rules = rules;
        self
    }

    pub fn with_suppression_rules(mut self, rules: &'a [SuppressionRule]) -> Self {
        self.suppression_rules = rules;
        self
    }

    pub fn with_adjustments(mut self, adjustments: &'a [BundleAdjustment]) -> Self {
        self.adjustments = adjustments;
        self
    }

    /// Stems suppressed for this selection: the first matching rule's list.
    pub fn suppressed_stems(&self, selection: &SelectionSet) -> HashSet<&'a str> {
        self.suppression_rules
            .iter()
            .find(|rule| rule.when.holds(self.target, selection))
            .map(|rule| rule.suppress.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Run every pre-filter, in order.
    pub fn prefilter(&self, records: Vec<BundleRecord>, selection: &SelectionSet) -> Vec<BundleRecord> {
        let catalog = self.catalog;
        let records: Vec<BundleRecord> = records
            .into_iter()
            .filter(|record| {
                let container = record.container_stem();
                let keep = !catalog.contains(container) || selection.is_selected(container);
                if !keep {
                    debug!(path = %record.path, "Dropping bundle of unselected kext {}", container);
                }
                keep
            })
            .collect();

        let records = apply_variant_rules(records, self.variant_rules, self.target, selection);

        let suppressed = self.suppressed_stems(selection);
        records
            .into_iter()
            .filter(|record| {
                let keep = !suppressed.contains(record.stem());
                if !keep {
                    info!(path = %record.path, "Suppressing redundant bundle");
                }
                keep
            })
            .collect()
    }

    /// Pre-filter `records`, then emit them in dependency order.
    ///
    /// # Errors
    ///
    /// `KextPlanError::DependencyCycle` when library dependencies loop and the
    /// policy is [`CyclePolicy::Reject`].
    pub fn linearize(&self, records: Vec<BundleRecord>, selection: &SelectionSet) -> Result<Vec<ManifestEntry>> {
        let records = self.prefilter(records, selection);
        let nodes: Vec<Node> = records
            .iter()
            .filter_map(|record| match record.identifier.as_deref() {
                Some(identifier) if !identifier.is_empty() => Some(Node { record, identifier }),
                _ => {
                    warn!(path = %record.path, "Skipping bundle without an identifier");
                    None
                }
            })
            .collect();

        let mut walk = Walk::new(self, &nodes);
        for i in 0..nodes.len() {
            walk.visit(i)?;
        }

        debug!(entries = walk.out.len(), "Linearized load order for Darwin {}", self.target);
        Ok(walk.out)
    }

    fn starting_bounds(&self, record: &BundleRecord) -> VersionBounds {
        BundleOwner::of(self.catalog, record).bounds(self.catalog)
    }

    fn adjust(&self, record: &BundleRecord, bounds: VersionBounds) -> VersionBounds {
        let stem = record.stem();
        self.adjustments
            .iter()
            .filter(|a| a.bundle == stem)
            .fold(bounds, |b, a| a.adjustment.apply(b, self.target))
    }
}

#[derive(Debug, Clone, Copy)]
struct Node<'r> {
    record: &'r BundleRecord,
    identifier: &'r str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Traversal state for one `linearize` call.
struct Walk<'l, 'r> {
    linearizer: &'l LoadOrderLinearizer<'l>,
    nodes: &'r [Node<'r>],
    /// Node index of the first node with the same `(path, identifier)`
    slots: Vec<usize>,
    /// identifier -> node index, last one wins
    by_identifier: HashMap<&'r str, usize>,
    marks: Vec<Mark>,
    bounds: Vec<VersionBounds>,
    stack: Vec<usize>,
    seen: HashSet<&'r str>,
    out: Vec<ManifestEntry>,
}

impl<'l, 'r> Walk<'l, 'r> {
    fn new(linearizer: &'l LoadOrderLinearizer<'l>, nodes: &'r [Node<'r>]) -> Self {
        let mut first_by_key: HashMap<(&str, &str), usize> = HashMap::new();
        let slots = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| *first_by_key.entry((node.record.path.as_str(), node.identifier)).or_insert(i))
            .collect();

        let mut by_identifier = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            by_identifier.insert(node.identifier, i);
        }

        let default_bounds = linearizer.catalog.default_bounds();
        Self {
            linearizer,
            nodes,
            slots,
            by_identifier,
            marks: vec![Mark::Unvisited; nodes.len()],
            bounds: vec![default_bounds; nodes.len()],
            stack: Vec::new(),
            seen: HashSet::new(),
            out: Vec::with_capacity(nodes.len()),
        }
    }

    fn visit(&mut self, index: usize) -> Result<()> {
        let slot = self.slots[index];
        if self.marks[slot] != Mark::Unvisited {
            return Ok(());
        }

        let node = self.nodes[slot];
        self.marks[slot] = Mark::Visiting;
        self.stack.push(slot);

        let mut bounds = self.linearizer.starting_bounds(node.record);

        for library in &node.record.libraries {
            let Some(&dep) = self.by_identifier.get(library.as_str()) else {
                debug!(bundle = node.identifier, library = %library, "Ignoring dangling library dependency");
                continue;
            };
            let dep_slot = self.slots[dep];

            match self.marks[dep_slot] {
                Mark::Visiting => match self.linearizer.cycle_policy {
                    CyclePolicy::Reject => return Err(self.cycle_error(dep_slot)),
                    CyclePolicy::Break => {
                        warn!(bundle = node.identifier, library = %library, "Breaking dependency cycle");
                        continue;
                    }
                },
                Mark::Unvisited => self.visit(dep_slot)?,
                Mark::Done => {}
            }

            bounds = bounds.narrow(self.bounds[dep_slot]);
        }

        let bounds = self.linearizer.adjust(node.record, bounds);
        if bounds.is_empty() {
            warn!(bundle = node.identifier, bounds = %bounds, "Narrowed bounds are empty");
        }

        self.stack.pop();
        self.marks[slot] = Mark::Done;
        self.bounds[slot] = bounds;

        let enabled = self.seen.insert(node.identifier);
        if !enabled {
            debug!(path = %node.record.path, "Duplicate bundle identifier {} emitted disabled", node.identifier);
        }

        self.out.push(ManifestEntry {
            path: node.record.path.clone(),
            identifier: node.identifier.to_string(),
            version: node.record.version.clone(),
            executable_path: node.record.executable_path.clone(),
            plist_path: node.record.plist_path.clone(),
            effective_min: bounds.min,
            effective_max: bounds.max,
            enabled,
        });
        Ok(())
    }

    fn cycle_error(&self, back_to: usize) -> KextPlanError {
        let start = self.stack.iter().position(|&s| s == back_to).unwrap_or(0);
        let chain = self.stack[start..]
            .iter()
            .chain(std::iter::once(&back_to))
            .map(|&s| self.nodes[s].identifier);
        KextPlanError::cycle(chain)
    }
}

// ============================================================================
// Tests
// ============================================================================
