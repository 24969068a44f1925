//! Name-to-constructor registry for detectors.
//!
//! The registry is an ordinary value, so independent detector sets can live
//! side by side (tests register their own fakes).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::detector::Detector;
use crate::error::DetectError;
use crate::version::VersionDetector;

/// Builds a fresh detector instance.
pub type DetectorFactory = Arc<dyn Fn() -> Arc<dyn Detector> + Send + Sync>;

/// Registry for detector discovery and construction.
#[derive(Clone)]
pub struct DetectorRegistry {
    factories: HashMap<String, DetectorFactory>,
}

impl DetectorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding the built-in detectors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("version", || Arc::new(VersionDetector::new()));
        registry
    }

    /// Register or replace a constructor under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Detector> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate detectors by name.
    ///
    /// Duplicates collapse to their first occurrence. Any unknown name fails
    /// the whole call before anything is constructed.
    pub fn build(&self, names: &[String]) -> Result<Vec<Arc<dyn Detector>>, DetectError> {
        if let Some(unknown) = names.iter().find(|name| !self.contains(name)) {
            return Err(DetectError::UnknownDetector(unknown.clone()));
        }

        let mut seen = HashSet::new();
        Ok(names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| self.factories.get(name))
            .map(|factory| factory())
            .collect())
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.names())
            .finish()
    }
}
