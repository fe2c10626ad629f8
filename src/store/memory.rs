// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::{
    core::{error::Result, types::PrefValue},
    store::{KeyValueStore, RegisteredDefaults},
};

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, PrefValue>,
    defaults: RegisteredDefaults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value written under `key`, ignoring registered defaults.
    pub fn stored(&self, key: &str) -> Option<&PrefValue> {
        self.values.get(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<PrefValue>> {
        Ok(self.defaults.resolve(key, self.values.get(key).cloned()))
    }

    fn set(&mut self, key: &str, value: PrefValue) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn register_defaults(&mut self, defaults: HashMap<String, PrefValue>) -> Result<()> {
        self.defaults.merge(defaults);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_restores_the_registered_default() -> Result<()> {
        let mut store = MemoryStore::new();
        store.register_defaults(HashMap::from([("k".into(), PrefValue::from("default"))]))?;
        store.set("k", PrefValue::from("custom"))?;
        assert_eq!(store.get("k")?, Some(PrefValue::from("custom")));

        store.remove("k")?;
        assert_eq!(store.get("k")?, Some(PrefValue::from("default")));
        assert_eq!(store.stored("k"), None);
        Ok(())
    }

    #[test]
    fn keys_list_stored_values_only() -> Result<()> {
        let mut store = MemoryStore::new();
        store.register_defaults(HashMap::from([("a".into(), PrefValue::Integer(1))]))?;
        store.set("c", PrefValue::Integer(3))?;
        store.set("b", PrefValue::Integer(2))?;

        assert_eq!(store.keys()?, vec!["b", "c"]);
        Ok(())
    }
}
