//! Normalization sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::observable::Observable;

/// The set of observables a density is normalized against.
///
/// A PDF asked for its value under a norm set that contains its observable
/// returns a proper density (unit integral over the observable's binning
/// range); otherwise it returns the raw, unnormalized shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormSet {
    names: BTreeSet<String>,
}

impl NormSet {
    /// An empty norm set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A norm set over a single observable.
    pub fn single(name: impl Into<String>) -> Self {
        let mut set = Self::default();
        set.insert(name);
        set
    }

    /// Add an observable by name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Whether `observable` is normalized over.
    pub fn contains(&self, observable: &Observable) -> bool {
        self.names.contains(observable.name())
    }

    /// Number of observables in the set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Binning;

    #[test]
    fn test_contains_by_name() {
        let obs = Observable::new("mass", 0.0, Binning::uniform(2, 0.0, 1.0).unwrap());
        let other = Observable::new("time", 0.0, Binning::uniform(2, 0.0, 1.0).unwrap());
        let norm = NormSet::single("mass");
        assert!(norm.contains(&obs));
        assert!(!norm.contains(&other));
        assert_eq!(norm.len(), 1);
        assert!(!norm.is_empty());
    }
}
