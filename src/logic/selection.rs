//! Per-run selection state.
//!
//! A `SelectionSet` is created fresh for every resolution run, seeded with the
//! catalog's required descriptors, and handed back to the caller by value. The
//! catalog itself never carries a "checked" flag.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::catalog::KextCatalog;

/// Names of the descriptors selected in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectionSet {
    selected: HashSet<String>,
}

impl SelectionSet {
    /// An empty selection (not even the required descriptors).
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection seeded with every required descriptor of `catalog`.
    pub fn seeded(catalog: &KextCatalog) -> Self {
        Self {
            selected: catalog.required().map(|k| k.name.clone()).collect(),
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// Mark `name` selected. Returns false if it already was.
    pub fn mark(&mut self, name: &str) -> bool {
        self.selected.insert(name.to_string())
    }

    /// Mark `name` unselected. Returns false if it was not selected.
    pub fn unmark(&mut self, name: &str) -> bool {
        self.selected.remove(name)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected names in catalog order; names unknown to the catalog follow, sorted.
    pub fn names_in<'a>(&'a self, catalog: &'a KextCatalog) -> Vec<&'a str> {
        let mut names: Vec<&str> = catalog
            .iter()
            .filter(|k| self.is_selected(&k.name))
            .map(|k| k.name.as_str())
            .collect();

        let mut extra: Vec<&str> = self
            .selected
            .iter()
            .map(String::as_str)
            .filter(|name| !catalog.contains(name))
            .collect();
        extra.sort_unstable();
        names.extend(extra);
        names
    }

    /// `name -> selected` for every catalog descriptor, for summary views.
    pub fn snapshot(&self, catalog: &KextCatalog) -> BTreeMap<String, bool> {
        catalog
            .iter()
            .map(|k| (k.name.clone(), self.is_selected(&k.name)))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            selected: iter.into_iter().map(Into::into).collect(),
        }
    }
}
