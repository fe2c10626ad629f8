// SPDX-License-Identifier: MIT

//! Key-value stores backing preference sections and list bindings.
//!
//! A store maps string keys to [`PrefValue`]s. Values written with
//! [`KeyValueStore::set`] take precedence over defaults handed to
//! [`KeyValueStore::register_defaults`]; the registered defaults are volatile
//! and never persisted, like the registration domain of a user-defaults
//! database.
//!
//! Backend selection:
//! - [`CfStore`] for user and global domains on macOS (CFPreferences).
//! - [`PlistStore`] for path domains, and for every domain when
//!   CoreFoundation is unavailable.
//! - [`MemoryStore`] for volatile settings and tests.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::core::{
    error::Result,
    types::{Domain, PrefValue},
};

mod file;
#[cfg(target_os = "macos")]
mod foundation;
mod memory;

pub use file::PlistStore;
#[cfg(target_os = "macos")]
pub use foundation::CfStore;
pub use memory::MemoryStore;

/// Synchronous key-value store with a default-registration layer.
pub trait KeyValueStore {
    /// Returns the stored value, or the registered default when nothing is stored.
    fn get(&self, key: &str) -> Result<Option<PrefValue>>;

    /// Overwrites the value under `key`.
    fn set(&mut self, key: &str, value: PrefValue) -> Result<()>;

    /// Removes the stored value so the registered default applies again.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Merges `defaults` into the registration layer.
    fn register_defaults(&mut self, defaults: HashMap<String, PrefValue>) -> Result<()>;

    /// Keys with a stored value, sorted. Registered defaults are not listed.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Shared handle to the store used by every section of an application.
pub type StoreHandle = Rc<RefCell<dyn KeyValueStore>>;

/// Wraps a concrete store into a [`StoreHandle`].
pub fn shared<S: KeyValueStore + 'static>(store: S) -> StoreHandle {
    Rc::new(RefCell::new(store))
}

/// Volatile registration layer shared by the store implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct RegisteredDefaults {
    values: HashMap<String, PrefValue>,
}

impl RegisteredDefaults {
    pub(crate) fn merge(&mut self, defaults: HashMap<String, PrefValue>) {
        self.values.extend(defaults);
    }

    /// Falls back to the registered default when `stored` is empty.
    pub(crate) fn resolve(&self, key: &str, stored: Option<PrefValue>) -> Option<PrefValue> {
        stored.or_else(|| self.values.get(key).cloned())
    }
}

/// Backend selection for a domain (CoreFoundation vs File).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend {
    CoreFoundation,
    File,
}

impl ActiveBackend {
    /// Determines the backend to use for `domain` at runtime.
    pub fn for_domain(domain: &Domain) -> Self {
        if matches!(domain, Domain::Path(_)) {
            return ActiveBackend::File;
        }
        #[cfg(target_os = "macos")]
        if crate::core::foundation::cf_available() {
            return ActiveBackend::CoreFoundation;
        }
        ActiveBackend::File
    }
}

/// Opens the store for `domain` with the backend chosen by [`ActiveBackend::for_domain`].
pub fn open_store(domain: &Domain) -> Result<StoreHandle> {
    let backend = ActiveBackend::for_domain(domain);
    tracing::debug!(%domain, ?backend, "opening preferences store");
    match backend {
        #[cfg(target_os = "macos")]
        ActiveBackend::CoreFoundation => Ok(shared(CfStore::new(domain)?)),
        _ => Ok(shared(PlistStore::open(domain.get_path()?)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_values_shadow_registered_defaults() {
        let mut defaults = RegisteredDefaults::default();
        defaults.merge(HashMap::from([("a".to_string(), PrefValue::Integer(1))]));

        assert_eq!(defaults.resolve("a", None), Some(PrefValue::Integer(1)));
        assert_eq!(
            defaults.resolve("a", Some(PrefValue::Integer(2))),
            Some(PrefValue::Integer(2))
        );
        assert_eq!(defaults.resolve("b", None), None);
    }

    #[test]
    fn path_domains_always_use_files() {
        let domain = Domain::Path("/tmp/example.plist".into());
        assert_eq!(ActiveBackend::for_domain(&domain), ActiveBackend::File);
    }
}
