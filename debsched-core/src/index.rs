//! The external package-index collaborator boundary (C2).

use std::collections::{BTreeSet, HashMap};

/// Abstract APT-style package index. The core's sole dependency on the
/// outside world for runtime-dependency information.
pub trait PackageIndex {
    /// Direct runtime dependencies of `binary_name` as known to the index.
    ///
    /// Binaries not present in the index return an empty set — they are
    /// treated as external and always available.
    fn candidate_dependencies(&self, binary_name: &str) -> BTreeSet<String>;
}

/// In-memory `HashMap`-backed [`PackageIndex`], for tests and the CLI demo.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPackageIndex {
    runtime_depends: HashMap<String, BTreeSet<String>>,
}

impl InMemoryPackageIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binary`'s direct runtime dependencies.
    pub fn insert(&mut self, binary: impl Into<String>, depends: impl IntoIterator<Item = String>) {
        let _ = self
            .runtime_depends
            .insert(binary.into(), depends.into_iter().collect());
    }
}

impl PackageIndex for InMemoryPackageIndex {
    fn candidate_dependencies(&self, binary_name: &str) -> BTreeSet<String> {
        self.runtime_depends
            .get(binary_name)
            .cloned()
            .unwrap_or_default()
    }
}
