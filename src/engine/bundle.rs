//! Bundle records produced by introspecting the kexts directory.
//!
//! Reading `Info.plist` files is the introspection collaborator's job; the
//! engine only consumes the fields below, usually from a JSON array.
//!
//! Paths are relative to the kexts directory and `/`-separated, e.g.
//! `VoodooPS2Controller.kext/Contents/PlugIns/VoodooPS2Mouse.kext`. Variant
//! builds of one driver sit under a tagged directory:
//! `AirportItlwm23.4/AirportItlwm.kext`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::catalog::{KextCatalog, KextDescriptor};
use crate::types::VersionBounds;

const BUNDLE_EXTENSION: &str = ".kext";

fn default_plist_path() -> String {
    "Contents/Info.plist".to_string()
}

/// One on-disk driver bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Path relative to the kexts directory
    pub path: String,
    /// `CFBundleIdentifier`; records without one are never emitted
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub version: String,
    /// e.g. `Contents/MacOS/Lilu`; empty for codeless bundles
    #[serde(default)]
    pub executable_path: String,
    #[serde(default = "default_plist_path")]
    pub plist_path: String,
    /// Declared library identifiers (`OSBundleLibraries`), in declaration order
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl BundleRecord {
    /// Minimal record, mostly for tests and ad-hoc construction.
    pub fn new(path: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            identifier: Some(identifier.into()),
            version: String::new(),
            executable_path: String::new(),
            plist_path: default_plist_path(),
            libraries: Vec::new(),
        }
    }

    pub fn with_libraries<I, S>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries = libraries.into_iter().map(Into::into).collect();
        self
    }

    /// The bundle's own name: last path component without `.kext`.
    pub fn stem(&self) -> &str {
        let last = self.path.rsplit('/').find(|c| !c.is_empty()).unwrap_or(self.path.as_str());
        bundle_stem(last)
    }

    /// Name of the outermost `.kext` bundle on the path.
    ///
    /// For a plugin this is its host (`VoodooPS2Controller`); for a variant
    /// under a tagged directory it is the driver itself (`AirportItlwm`).
    pub fn container_stem(&self) -> &str {
        self.path
            .split('/')
            .find(|c| c.ends_with(BUNDLE_EXTENSION))
            .map(bundle_stem)
            .unwrap_or_else(|| self.stem())
    }

    /// Load a JSON array of bundle records.
    pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read bundle records from {:?}", path.as_ref()))?;

        let records = Self::parse_all(&content).context("Failed to parse bundle records JSON")?;

        Ok(records)
    }

    /// Parse a JSON array of bundle records.
    pub fn parse_all(json: &str) -> crate::error::Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Strip a trailing `.kext` from one path component.
pub fn bundle_stem(component: &str) -> &str {
    component.strip_suffix(BUNDLE_EXTENSION).unwrap_or(component)
}

/// Where a bundle's starting bounds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOwner<'a> {
    /// The bundle's stem names a catalog descriptor.
    Catalog(&'a KextDescriptor),
    /// Plugins and kexts the catalog does not know.
    AdHoc,
}

impl<'a> BundleOwner<'a> {
    pub fn of(catalog: &'a KextCatalog, record: &BundleRecord) -> Self {
        match catalog.get(record.stem()) {
            Some(kext) => Self::Catalog(kext),
            None => Self::AdHoc,
        }
    }

    pub fn bounds(&self, catalog: &KextCatalog) -> VersionBounds {
        match self {
            Self::Catalog(kext) => kext.window(),
            Self::AdHoc => catalog.default_bounds(),
        }
    }
}
