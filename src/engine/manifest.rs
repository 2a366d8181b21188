//! Bootloader `Kernel -> Add` entries.
//!
//! Converts the linearized [`ManifestEntry`] list into the dictionary shape
//! OpenCore's `config.plist` expects. Bounds equal to the catalog-wide
//! defaults are written as empty strings, which the bootloader reads as
//! "no limit". A maximum equal to the latest non-beta release is open too,
//! so a manifest built before a beta ships keeps loading on it.

use serde::{Deserialize, Serialize};

use super::load_order::ManifestEntry;
use crate::catalog::KextCatalog;
use crate::types::{DarwinVersion, VersionBounds};

pub const DEFAULT_COMMENT: &str = " | kextplan";

/// Bounds written as empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenBounds {
    pub lowest: DarwinVersion,
    pub latest: DarwinVersion,
    pub latest_release: DarwinVersion,
}

impl OpenBounds {
    pub fn of(catalog: &KextCatalog) -> Self {
        let defaults = catalog.default_bounds();
        Self {
            lowest: defaults.min,
            latest: defaults.max,
            latest_release: catalog.latest_release(),
        }
    }

    fn open_min(&self, min: DarwinVersion) -> bool {
        min == self.lowest
    }

    fn open_max(&self, max: DarwinVersion) -> bool {
        max == self.latest || max == self.latest_release
    }
}

impl From<VersionBounds> for OpenBounds {
    fn from(bounds: VersionBounds) -> Self {
        Self {
            lowest: bounds.min,
            latest: bounds.max,
            latest_release: bounds.max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KernelAddEntry {
    pub arch: String,
    pub bundle_path: String,
    pub comment: String,
    pub enabled: bool,
    pub executable_path: String,
    pub max_kernel: String,
    pub min_kernel: String,
    pub plist_path: String,
}

impl KernelAddEntry {
    pub fn from_manifest(entry: &ManifestEntry, open: OpenBounds, comment: &str) -> Self {
        let max_kernel = if open.open_max(entry.effective_max) {
            String::new()
        } else {
            entry.effective_max.to_string()
        };
        let min_kernel = if open.open_min(entry.effective_min) {
            String::new()
        } else {
            entry.effective_min.to_string()
        };

        Self {
            arch: "x86_64".to_string(),
            bundle_path: entry.path.clone(),
            comment: comment.to_string(),
            enabled: entry.enabled,
            executable_path: entry.executable_path.clone(),
            max_kernel,
            min_kernel,
            plist_path: entry.plist_path.clone(),
        }
    }
}

/// Convert a whole load order.
pub fn kernel_add(entries: &[ManifestEntry], open: OpenBounds, comment: &str) -> Vec<KernelAddEntry> {
    entries
        .iter()
        .map(|e| KernelAddEntry::from_manifest(e, open, comment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> DarwinVersion {
        s.parse().unwrap()
    }

    fn entry(min: &str, max: &str) -> ManifestEntry {
        ManifestEntry {
            path: "Lilu.kext".to_string(),
            identifier: "as.vit9696.Lilu".to_string(),
            version: "1.6.8".to_string(),
            executable_path: "Contents/MacOS/Lilu".to_string(),
            plist_path: "Contents/Info.plist".to_string(),
            effective_min: v(min),
            effective_max: v(max),
            enabled: true,
        }
    }

    #[test]
    fn test_default_bounds_blanked() {
        let defaults = OpenBounds::from(VersionBounds::new(v("17.0.0"), v("25.99.99")));
        let add = KernelAddEntry::from_manifest(&entry("17.0.0", "25.99.99"), defaults, DEFAULT_COMMENT);
        assert_eq!(add.min_kernel, "");
        assert_eq!(add.max_kernel, "");
        assert_eq!(add.arch, "x86_64");

        let add = KernelAddEntry::from_manifest(&entry("20.0.0", "23.99.99"), defaults, DEFAULT_COMMENT);
        assert_eq!(add.min_kernel, "20.0.0");
        assert_eq!(add.max_kernel, "23.99.99");
    }

    #[test]
    fn test_latest_release_max_blanked() {
        let open = OpenBounds {
            lowest: v("17.0.0"),
            latest: v("25.99.99"),
            latest_release: v("24.99.99"),
        };
        let add = KernelAddEntry::from_manifest(&entry("18.0.0", "24.99.99"), open, DEFAULT_COMMENT);
        assert_eq!(add.max_kernel, "");
        assert_eq!(add.min_kernel, "18.0.0");

        let add = KernelAddEntry::from_manifest(&entry("17.0.0", "23.99.99"), open, DEFAULT_COMMENT);
        assert_eq!(add.max_kernel, "23.99.99");
        assert_eq!(add.min_kernel, "");

        // The latest release only opens the maximum
        let add = KernelAddEntry::from_manifest(&entry("24.99.99", "25.99.99"), open, DEFAULT_COMMENT);
        assert_eq!(add.min_kernel, "24.99.99");
        assert_eq!(add.max_kernel, "");
    }

    #[test]
    fn test_open_bounds_of_builtin_catalog() {
        let open = OpenBounds::of(&KextCatalog::builtin());
        assert_eq!(open.lowest, v("17.0.0"));
        assert_eq!(open.latest, v("25.99.99"));
        assert_eq!(open.latest_release, v("24.99.99"));
    }

    #[test]
    fn test_pascal_case_keys() {
        let defaults = OpenBounds::from(VersionBounds::new(v("17.0.0"), v("25.99.99")));
        let list = kernel_add(&[entry("18.0.0", "25.99.99")], defaults, " | test");
        let json = serde_json::to_value(&list).unwrap();
        let obj = &json[0];
        assert_eq!(obj["Arch"], "x86_64");
        assert_eq!(obj["BundlePath"], "Lilu.kext");
        assert_eq!(obj["Comment"], " | test");
        assert_eq!(obj["Enabled"], true);
        assert_eq!(obj["ExecutablePath"], "Contents/MacOS/Lilu");
        assert_eq!(obj["MaxKernel"], "");
        assert_eq!(obj["MinKernel"], "18.0.0");
        assert_eq!(obj["PlistPath"], "Contents/Info.plist");
    }
}
