// SPDX-License-Identifier: MIT

//! Default values for every declared preference.
//!
//! The registry is filled while sections are declared and handed to the
//! store exactly once. After that it is frozen.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    core::{
        error::{PrefError, Result},
        types::PrefValue,
    },
    store::KeyValueStore,
};

/// Table of fully-qualified key → default value.
#[derive(Debug, Default, Clone)]
pub struct PreferenceRegistry {
    defaults: HashMap<String, PrefValue>,
    committed: bool,
}

impl PreferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites one default. Does not touch any store.
    pub fn register(&mut self, key: impl Into<String>, default: impl Into<PrefValue>) -> Result<()> {
        if self.committed {
            return Err(PrefError::RegistryCommitted);
        }
        self.defaults.insert(key.into(), default.into());
        Ok(())
    }

    /// Hands every accumulated default to `store`.
    ///
    /// Must run once, after all sections are declared; defaults registered
    /// later are rejected.
    pub fn commit(&mut self, store: &mut dyn KeyValueStore) -> Result<()> {
        if self.committed {
            return Err(PrefError::RegistryCommitted);
        }
        debug!(count = self.defaults.len(), "registering preference defaults");
        store.register_defaults(self.defaults.clone())?;
        self.committed = true;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PrefValue> {
        self.defaults.get(key)
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrefValue)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn register_overwrites_until_commit() -> Result<()> {
        let mut registry = PreferenceRegistry::new();
        registry.register("General.size", 1)?;
        registry.register("General.size", 2)?;
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("General.size"), Some(&PrefValue::Integer(2)));

        let mut store = MemoryStore::new();
        assert_eq!(store.get("General.size")?, None);
        registry.commit(&mut store)?;
        assert_eq!(store.get("General.size")?, Some(PrefValue::Integer(2)));
        assert!(registry.is_committed());
        Ok(())
    }

    #[test]
    fn commit_happens_once() -> Result<()> {
        let mut registry = PreferenceRegistry::new();
        let mut store = MemoryStore::new();
        registry.commit(&mut store)?;

        assert!(matches!(
            registry.commit(&mut store),
            Err(PrefError::RegistryCommitted)
        ));
        assert!(matches!(
            registry.register("late.key", true),
            Err(PrefError::RegistryCommitted)
        ));
        assert!(registry.is_empty());
        Ok(())
    }
}
