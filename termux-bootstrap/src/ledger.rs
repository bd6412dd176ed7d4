// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tracking of installed paths. */

use std::collections::{BTreeSet, HashMap, HashSet};

/// Records which paths each package installed.
///
/// Paths are only recorded once they were written to the build tree or to the
/// symlink manifest.
#[derive(Clone, Debug, Default)]
pub struct ContentLedger {
    packages: HashMap<String, BTreeSet<String>>,
    symlinks: HashSet<String>,
}

impl ContentLedger {
    /// Register a package so it has an entry even if it installs nothing.
    pub fn register_package(&mut self, package: &str) {
        self.packages.entry(package.to_string()).or_default();
    }

    /// Record a path installed by a package.
    pub fn record(&mut self, package: &str, path: &str) {
        self.packages
            .entry(package.to_string())
            .or_default()
            .insert(path.to_string());
    }

    /// Record a symlink installed by a package.
    pub fn record_symlink(&mut self, package: &str, path: &str) {
        self.record(package, path);
        self.symlinks.insert(path.to_string());
    }

    /// Paths installed by a package, in lexicographic order.
    pub fn paths(&self, package: &str) -> impl Iterator<Item = &str> {
        self.packages
            .get(package)
            .into_iter()
            .flat_map(|paths| paths.iter().map(|p| p.as_str()))
    }

    /// Whether a path was recorded as a symlink.
    pub fn is_symlink(&self, path: &str) -> bool {
        self.symlinks.contains(path)
    }

    /// Number of recorded symlinks.
    pub fn symlink_count(&self) -> usize {
        self.symlinks.len()
    }

    /// Total number of recorded paths.
    pub fn len(&self) -> usize {
        self.packages.values().map(|paths| paths.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
