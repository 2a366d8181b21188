//! Compatibility gate: Darwin support windows and the override decision.
//!
//! A candidate outside its window is either silently skipped or, if the
//! override collaborator agrees, forced in anyway. The gate itself never asks
//! anyone anything; it only reports what is out of window and lets an
//! [`OverrideDecision`] implementor answer once per run.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::info;

use crate::catalog::{KextCatalog, KextDescriptor};
use crate::types::DarwinVersion;

/// A candidate that is not supported on the target version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incompatibility {
    pub name: String,
    /// The kext transitively requires the core hook (a Lilu plugin), so the
    /// hook's beta boot argument can force it to load.
    pub depends_on_core_hook: bool,
}

/// True iff `min_version <= target <= max_version`.
pub fn in_window(kext: &KextDescriptor, target: DarwinVersion) -> bool {
    kext.window().contains(target)
}

/// Every candidate outside its support window, in candidate order.
///
/// Unknown names are ignored and repeated names are reported once. An empty
/// result means no override decision is needed.
pub fn verify<S: AsRef<str>>(
    catalog: &KextCatalog,
    candidates: &[S],
    target: DarwinVersion,
) -> Vec<Incompatibility> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|c| c.as_ref())
        .filter(|name| seen.insert(*name))
        .filter_map(|name| catalog.get(name))
        .filter(|kext| !in_window(kext, target))
        .map(|kext| Incompatibility {
            name: kext.name.clone(),
            depends_on_core_hook: catalog.requires_transitively(&kext.name, catalog.core_hook()),
        })
        .collect()
}

/// Plain-text warning shown before forcing unsupported kexts.
pub fn warning_text(incompatible: &[Incompatibility], target: DarwinVersion, core_hook: &str) -> String {
    let mut text = format!("Incompatible kexts for the current macOS version ({}):\n", target);
    for (i, kext) in incompatible.iter().enumerate() {
        let _ = write!(text, "  {}. {}", i + 1, kext.name);
        if kext.depends_on_core_hook {
            let _ = write!(text, " - {} plugin", core_hook);
        }
        text.push('\n');
    }
    let _ = write!(
        text,
        "\nNote:\n\
         - {} plugins can be forced to load with the \"-lilubetaall\" boot argument.\n\
         - Forcing unsupported kexts can make the system unstable.\n\
         \nForce load {} on the unsupported macOS version?",
        core_hook,
        if incompatible.len() > 1 { "these kexts" } else { "this kext" }
    );
    text
}

/// The yes/no collaborator consulted when candidates are out of window.
///
/// It is only asked when `incompatible` is non-empty.
pub trait OverrideDecision {
    fn allow_unsupported(&self, incompatible: &[Incompatibility], target: DarwinVersion) -> bool;
}

/// A fixed answer.
impl OverrideDecision for bool {
    fn allow_unsupported(&self, _incompatible: &[Incompatibility], _target: DarwinVersion) -> bool {
        *self
    }
}

impl<F> OverrideDecision for F
where
    F: Fn(&[Incompatibility], DarwinVersion) -> bool,
{
    fn allow_unsupported(&self, incompatible: &[Incompatibility], target: DarwinVersion) -> bool {
        self(incompatible, target)
    }
}

/// Never force unsupported kexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyUnsupported;

impl OverrideDecision for DenyUnsupported {
    fn allow_unsupported(&self, _incompatible: &[Incompatibility], _target: DarwinVersion) -> bool {
        false
    }
}

/// Always force unsupported kexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowUnsupported;

impl OverrideDecision for AllowUnsupported {
    fn allow_unsupported(&self, _incompatible: &[Incompatibility], _target: DarwinVersion) -> bool {
        true
    }
}

/// Run the gate: verify, and consult `decision` only if something is out of window.
///
/// Returns the incompatibilities found and the resulting `allow_unsupported` flag.
pub fn gate<S: AsRef<str>>(
    catalog: &KextCatalog,
    candidates: &[S],
    target: DarwinVersion,
    decision: &dyn OverrideDecision,
) -> (Vec<Incompatibility>, bool) {
    let incompatible = verify(catalog, candidates, target);
    if incompatible.is_empty() {
        return (incompatible, false);
    }

    let allow = decision.allow_unsupported(&incompatible, target);
    info!(
        count = incompatible.len(),
        allow_unsupported = allow,
        "Unsupported kexts for Darwin {}",
        target
    );
    (incompatible, allow)
}
