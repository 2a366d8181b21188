//! Kext dependency resolver.
//!
//! Applies selections to a per-run [`SelectionSet`] over an immutable
//! [`KextCatalog`], enforcing required closure and conflict-group exclusivity.
//!
//! # Resolution Rules
//!
//! | Operation   | Effect |
//! |-------------|--------|
//! | `select`    | mark selected, select every `requires` entry, then deselect the other members of its conflict group |
//! | `deselect`  | mark unselected (never for required kexts) and unselect direct dependents |
//! | `reconcile` | apply a user checklist: drop unchecked kexts, select checked ones |
//!
//! # Design
//!
//! - **Last writer wins**: selecting a conflict-group member evicts the others
//! - **Gated, not failed**: an out-of-window kext without override is skipped
//!   silently; the caller decides whether to mention it
//! - **One-hop cascade**: `deselect` only reaches kexts that name the target in
//!   their own `requires`; dependents of those stay selected
//! - **Permissive names**: unknown names in `requires` or in a request are no-ops

use std::collections::HashSet;
use tracing::debug;

use crate::catalog::KextCatalog;
use crate::logic::compat::in_window;
use crate::logic::selection::SelectionSet;
use crate::types::DarwinVersion;

/// Recursive selection/deselection over one catalog for one run.
#[derive(Debug, Clone)]
pub struct DependencyResolver<'a> {
    catalog: &'a KextCatalog,
    selection: SelectionSet,
}

impl<'a> DependencyResolver<'a> {
    /// Start a run with only the required kexts selected.
    pub fn new(catalog: &'a KextCatalog) -> Self {
        Self {
            catalog,
            selection: SelectionSet::seeded(catalog),
        }
    }

    /// Continue from an existing selection (e.g. the result of candidate
    /// resolution, before a checklist edit).
    ///
    /// Required kexts are re-added if missing.
    pub fn with_selection(catalog: &'a KextCatalog, mut selection: SelectionSet) -> Self {
        for kext in catalog.required() {
            selection.mark(&kext.name);
        }
        Self { catalog, selection }
    }

    pub fn catalog(&self) -> &'a KextCatalog {
        self.catalog
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn into_selection(self) -> SelectionSet {
        self.selection
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.is_selected(name)
    }

    /// Select `name` and everything it requires.
    ///
    /// No-op when already selected, when unknown, or when outside its window
    /// and `allow_unsupported` is false.
    pub fn select(&mut self, name: &str, target: DarwinVersion, allow_unsupported: bool) {
        let catalog = self.catalog;
        let Some(kext) = catalog.get(name) else {
            debug!(kext = name, "Ignoring unknown kext");
            return;
        };

        if self.selection.is_selected(name) {
            return;
        }

        if !allow_unsupported && !in_window(kext, target) {
            debug!(
                kext = name,
                window = %kext.window(),
                "Skipping kext unsupported on Darwin {}",
                target
            );
            return;
        }

        self.selection.mark(&kext.name);

        for required in &kext.requires {
            self.select(required, target, allow_unsupported);
        }

        for peer in catalog.conflict_peers(kext) {
            if self.selection.is_selected(&peer.name) {
                debug!(kext = name, evicted = %peer.name, "Conflict group member replaced");
            }
            self.deselect(&peer.name);
        }
    }

    /// Select every name in order.
    pub fn select_all<S: AsRef<str>>(&mut self, names: &[S], target: DarwinVersion, allow_unsupported: bool) {
        for name in names {
            self.select(name.as_ref(), target, allow_unsupported);
        }
    }

    /// Unselect `name` and its direct, non-required dependents.
    ///
    /// Required kexts are never unselected.
    pub fn deselect(&mut self, name: &str) {
        let catalog = self.catalog;
        if catalog.get(name).is_some_and(|k| k.required) {
            return;
        }

        self.selection.unmark(name);

        for dependent in catalog.direct_dependents(name) {
            if !dependent.required && self.selection.unmark(&dependent.name) {
                debug!(kext = %dependent.name, requires = name, "Unselected dependent kext");
            }
        }
    }

    /// Names in `checked` that are not selected yet.
    ///
    /// These are the names a checklist edit would newly add, and the ones the
    /// compatibility gate should verify before [`Self::reconcile`].
    pub fn newly_checked<S: AsRef<str>>(&self, checked: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        checked
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| !self.selection.is_selected(name) && seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Apply a checklist edit.
    ///
    /// Every selected, non-required kext missing from `checked` is deselected
    /// (in catalog order, re-checking the live state so a cascade is not
    /// repeated), then every name in `checked` is selected.
    pub fn reconcile<S: AsRef<str>>(&mut self, checked: &[S], target: DarwinVersion, allow_unsupported: bool) {
        let catalog = self.catalog;
        let keep: HashSet<&str> = checked.iter().map(|s| s.as_ref()).collect();

        for kext in catalog.iter() {
            if !kext.required && self.selection.is_selected(&kext.name) && !keep.contains(kext.name.as_str()) {
                self.deselect(&kext.name);
            }
        }

        self.select_all(checked, target, allow_unsupported);
    }
}

// ============================================================================
// Tests
// ============================================================================
