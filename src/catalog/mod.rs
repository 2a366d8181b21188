//! Kext catalog: the immutable registry of driver descriptors.
//!
//! The catalog is an arena of [`KextDescriptor`]s indexed by name. It is
//! shared read-only state for the lifetime of the process; nothing in a
//! resolution run mutates it. Per-run selection state lives in
//! [`crate::logic::selection::SelectionSet`] instead.
//!
//! # Sources
//!
//! - [`KextCatalog::builtin`]: the stock driver table from [`builtin`]
//! - [`KextCatalog::load_from_file`]: a JSON catalog file
//!
//! # Invariants checked by [`KextCatalog::new`]
//!
//! - Names are unique
//! - Every window has `min <= max`
//! - Required descriptors are not members of a conflict group (a group
//!   member can be deselected, a required descriptor never can)

pub mod builtin;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{KextPlanError, Result};
use crate::types::{DarwinVersion, VersionBounds};

/// One driver in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KextDescriptor {
    /// Unique key, also the bundle file stem (`Lilu` for `Lilu.kext`)
    pub name: String,
    pub description: String,
    /// Display grouping label (e.g. "Graphics", "Wi-Fi")
    pub category: String,
    /// Always selected, never deselected
    pub required: bool,
    /// Inclusive lower Darwin bound
    pub min_version: DarwinVersion,
    /// Inclusive upper Darwin bound
    pub max_version: DarwinVersion,
    /// Names of descriptors that must be selected alongside this one
    pub requires: Vec<String>,
    /// Mutual-exclusion group id
    pub conflict_group: Option<String>,
}

impl KextDescriptor {
    /// The descriptor's support window.
    pub fn window(&self) -> VersionBounds {
        VersionBounds::new(self.min_version, self.max_version)
    }

    /// True if this descriptor names `other` in its `requires` list.
    pub fn requires_kext(&self, other: &str) -> bool {
        self.requires.iter().any(|r| r == other)
    }

    /// True if both descriptors belong to the same conflict group.
    pub fn conflicts_with(&self, other: &KextDescriptor) -> bool {
        match (&self.conflict_group, &other.conflict_group) {
            (Some(a), Some(b)) => a == b && self.name != other.name,
            _ => false,
        }
    }
}

/// A catalog entry as written in a JSON catalog file.
///
/// Bounds are optional and default to the catalog-wide bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_version: Option<DarwinVersion>,
    #[serde(default)]
    pub max_version: Option<DarwinVersion>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub conflict_group: Option<String>,
}

impl DescriptorEntry {
    fn into_descriptor(self, defaults: VersionBounds) -> KextDescriptor {
        KextDescriptor {
            name: self.name,
            description: self.description,
            category: self.category,
            required: self.required,
            min_version: self.min_version.unwrap_or(defaults.min),
            max_version: self.max_version.unwrap_or(defaults.max),
            requires: self.requires,
            conflict_group: self.conflict_group,
        }
    }
}

/// On-disk JSON catalog layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Lowest Darwin version the build targets (default lower bound)
    pub lowest_version: DarwinVersion,
    /// Latest Darwin version the build targets (default upper bound)
    pub latest_version: DarwinVersion,
    /// Latest non-beta Darwin version, when `latest_version` is a beta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_release_version: Option<DarwinVersion>,
    /// Name of the patching framework plugins depend on
    #[serde(default = "default_core_hook")]
    pub core_hook: String,
    pub kexts: Vec<DescriptorEntry>,
}

fn default_core_hook() -> String {
    builtin::CORE_HOOK.to_string()
}

/// Immutable registry of kext descriptors.
#[derive(Debug, Clone)]
pub struct KextCatalog {
    kexts: Vec<KextDescriptor>,
    index: HashMap<String, usize>,
    default_bounds: VersionBounds,
    latest_release: Option<DarwinVersion>,
    core_hook: String,
}

impl KextCatalog {
    /// Build a catalog, checking its structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `KextPlanError::Catalog` on duplicate names, inverted windows
    /// or a required descriptor inside a conflict group.
    pub fn new(
        kexts: Vec<KextDescriptor>,
        default_bounds: VersionBounds,
        core_hook: impl Into<String>,
    ) -> Result<Self> {
        if default_bounds.is_empty() {
            return Err(KextPlanError::catalog(format!(
                "default bounds are inverted ({})",
                default_bounds
            )));
        }

        let catalog = Self::from_parts(kexts, default_bounds, core_hook.into());
        catalog.validate()?;
        Ok(catalog)
    }

    /// Build without validation. Used for the compiled-in table, which the
    /// test suite validates.
    fn from_parts(kexts: Vec<KextDescriptor>, default_bounds: VersionBounds, core_hook: String) -> Self {
        let mut index = HashMap::with_capacity(kexts.len());
        for (i, kext) in kexts.iter().enumerate() {
            // First occurrence keeps the slot; validate() reports the duplicate.
            index.entry(kext.name.clone()).or_insert(i);
        }
        Self {
            kexts,
            index,
            default_bounds,
            latest_release: None,
            core_hook,
        }
    }

    /// Record the latest non-beta release when it differs from the upper
    /// default bound.
    pub fn with_latest_release(mut self, version: DarwinVersion) -> Self {
        self.latest_release = Some(version);
        self
    }

    /// The stock driver catalog.
    pub fn builtin() -> Self {
        Self::from_parts(
            builtin::descriptors(),
            builtin::DEFAULT_BOUNDS,
            builtin::CORE_HOOK.to_string(),
        )
        .with_latest_release(builtin::LATEST_RELEASE_VERSION)
    }

    /// Build a catalog from a parsed catalog file.
    pub fn from_file_contents(file: CatalogFile) -> Result<Self> {
        let defaults = VersionBounds::new(file.lowest_version, file.latest_version);
        let kexts = file
            .kexts
            .into_iter()
            .map(|entry| entry.into_descriptor(defaults))
            .collect();
        let catalog = Self::new(kexts, defaults, file.core_hook)?;

        match file.latest_release_version {
            Some(release) if !defaults.contains(release) => Err(KextPlanError::catalog(format!(
                "latest release {} is outside the default bounds ({})",
                release, defaults
            ))),
            Some(release) => Ok(catalog.with_latest_release(release)),
            None => Ok(catalog),
        }
    }

    /// Load a catalog from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog from {:?}", path.as_ref()))?;

        let file: CatalogFile =
            serde_json::from_str(&content).context("Failed to parse catalog JSON")?;

        let catalog = Self::from_file_contents(file)
            .with_context(|| format!("Invalid catalog in {:?}", path.as_ref()))?;

        Ok(catalog)
    }

    /// Check the structural invariants listed in the module docs.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for kext in &self.kexts {
            if kext.name.trim().is_empty() {
                return Err(KextPlanError::catalog("kext with an empty name"));
            }
            if !seen.insert(kext.name.as_str()) {
                return Err(KextPlanError::catalog(format!(
                    "duplicate kext name '{}'",
                    kext.name
                )));
            }
            if kext.window().is_empty() {
                return Err(KextPlanError::catalog(format!(
                    "kext '{}' has an inverted support window ({})",
                    kext.name,
                    kext.window()
                )));
            }
            if kext.required && kext.conflict_group.is_some() {
                return Err(KextPlanError::catalog(format!(
                    "required kext '{}' cannot belong to a conflict group",
                    kext.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&KextDescriptor> {
        self.index.get(name).map(|&i| &self.kexts[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &KextDescriptor> {
        self.kexts.iter()
    }

    pub fn len(&self) -> usize {
        self.kexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kexts.is_empty()
    }

    /// Bounds used for descriptors without explicit ones and for bundles
    /// that are not in the catalog.
    pub fn default_bounds(&self) -> VersionBounds {
        self.default_bounds
    }

    /// Latest non-beta release; the upper default bound unless set.
    pub fn latest_release(&self) -> DarwinVersion {
        self.latest_release.unwrap_or(self.default_bounds.max)
    }

    /// Name of the patching framework most plugins depend on.
    pub fn core_hook(&self) -> &str {
        &self.core_hook
    }

    /// Descriptors that are always selected.
    pub fn required(&self) -> impl Iterator<Item = &KextDescriptor> {
        self.kexts.iter().filter(|k| k.required)
    }

    /// Descriptors whose `requires` names `name` directly.
    ///
    /// This is exactly one hop: dependents of dependents are not included.
    pub fn direct_dependents(&self, name: &str) -> Vec<&KextDescriptor> {
        self.kexts.iter().filter(|k| k.requires_kext(name)).collect()
    }

    /// Other members of `kext`'s conflict group, in catalog order.
    pub fn conflict_peers<'a>(
        &'a self,
        kext: &'a KextDescriptor,
    ) -> impl Iterator<Item = &'a KextDescriptor> + 'a {
        self.kexts.iter().filter(move |other| kext.conflicts_with(other))
    }

    /// True if `name` reaches `target` through `requires` edges.
    ///
    /// Mutual `requires` pairs exist in practice, so the walk tracks what it
    /// has already expanded. Unknown names are dead ends.
    pub fn requires_transitively(&self, name: &str, target: &str) -> bool {
        let mut stack: Vec<&str> = vec![name];
        let mut expanded: HashSet<&str> = HashSet::new();

        while let Some(current) = stack.pop() {
            if !expanded.insert(current) {
                continue;
            }
            let Some(kext) = self.get(current) else {
                continue;
            };
            for req in &kext.requires {
                if req == target {
                    return true;
                }
                stack.push(req.as_str());
            }
        }
        false
    }
}

impl Default for KextCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

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

    fn bounds() -> VersionBounds {
        VersionBounds::new(v("17.0.0"), v("25.99.99"))
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = KextCatalog::builtin();
        assert!(catalog.validate().is_ok());
        assert!(!catalog.is_empty());
        assert!(catalog.contains("Lilu"));
        assert!(catalog.get("Lilu").unwrap().required);
        assert_eq!(catalog.core_hook(), "Lilu");
    }

    #[test]
    fn test_lookup_by_name() {
        let catalog = KextCatalog::new(
            vec![kext("A", &[], None), kext("B", &["A"], None)],
            bounds(),
            "A",
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("B").unwrap().requires, vec!["A".to_string()]);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = KextCatalog::new(vec![kext("A", &[], None), kext("A", &[], None)], bounds(), "A");
        assert!(matches!(result, Err(KextPlanError::Catalog(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut bad = kext("A", &[], None);
        bad.min_version = v("22.0.0");
        bad.max_version = v("21.0.0");
        let result = KextCatalog::new(vec![bad], bounds(), "A");
        assert!(result.is_err());
    }

    #[test]
    fn test_required_in_conflict_group_rejected() {
        let mut bad = kext("A", &[], Some("GPU"));
        bad.required = true;
        let result = KextCatalog::new(vec![bad], bounds(), "A");
        assert!(matches!(result, Err(KextPlanError::Catalog(_))));
    }

    #[test]
    fn test_direct_dependents_is_one_hop() {
        let catalog = KextCatalog::new(
            vec![
                kext("A", &[], None),
                kext("B", &["A"], None),
                kext("C", &["B"], None),
            ],
            bounds(),
            "A",
        )
        .unwrap();

        let names: Vec<&str> = catalog
            .direct_dependents("A")
            .iter()
            .map(|k| k.name.as_str())
            .collect();
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn test_conflict_peers_excludes_self() {
        let catalog = KextCatalog::new(
            vec![
                kext("X", &[], Some("G")),
                kext("Y", &[], Some("G")),
                kext("Z", &[], Some("H")),
            ],
            bounds(),
            "X",
        )
        .unwrap();

        let x = catalog.get("X").unwrap();
        let peers: Vec<&str> = catalog.conflict_peers(x).map(|k| k.name.as_str()).collect();
        assert_eq!(peers, vec!["Y"]);
    }

    #[test]
    fn test_requires_transitively_handles_mutual_pairs() {
        let catalog = KextCatalog::builtin();
        // corecaptureElCap <-> IO80211ElCap never reach Lilu
        assert!(!catalog.requires_transitively("corecaptureElCap", "Lilu"));
        // IntelBluetoothFirmware -> IntelBTPatcher -> Lilu
        assert!(catalog.requires_transitively("IntelBluetoothFirmware", "Lilu"));
        assert!(!catalog.requires_transitively("NoSuchKext", "Lilu"));
    }

    #[test]
    fn test_load_from_file_applies_default_bounds() {
        let json = r#"{
            "lowest_version": "18.0.0",
            "latest_version": "24.99.99",
            "kexts": [
                { "name": "Lilu", "required": true },
                { "name": "NootRX", "min_version": "20.5.0", "requires": ["Lilu"], "conflict_group": "GPU" }
            ]
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();

        let catalog = KextCatalog::load_from_file(file.path()).unwrap();
        let lilu = catalog.get("Lilu").unwrap();
        assert_eq!(lilu.min_version, v("18.0.0"));
        assert_eq!(lilu.max_version, v("24.99.99"));

        let noot = catalog.get("NootRX").unwrap();
        assert_eq!(noot.min_version, v("20.5.0"));
        assert_eq!(noot.conflict_group.as_deref(), Some("GPU"));
        assert_eq!(catalog.core_hook(), "Lilu");
        assert_eq!(catalog.latest_release(), v("24.99.99"));
    }

    #[test]
    fn test_latest_release_bound() {
        assert_eq!(KextCatalog::builtin().latest_release(), builtin::LATEST_RELEASE_VERSION);

        let file = |release: &str| CatalogFile {
            lowest_version: v("18.0.0"),
            latest_version: v("25.99.99"),
            latest_release_version: Some(v(release)),
            core_hook: "Lilu".to_string(),
            kexts: Vec::new(),
        };
        let catalog = KextCatalog::from_file_contents(file("24.99.99")).unwrap();
        assert_eq!(catalog.latest_release(), v("24.99.99"));
        assert_eq!(catalog.default_bounds().max, v("25.99.99"));

        let err = KextCatalog::from_file_contents(file("26.0.0")).unwrap_err();
        assert!(err.to_string().contains("outside the default bounds"));
    }

    #[test]
    fn test_load_from_file_rejects_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ invalid json }").unwrap();
        file.flush().unwrap();
        assert!(KextCatalog::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(KextCatalog::load_from_file("/nonexistent/catalog.json").is_err());
    }
}
