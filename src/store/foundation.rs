// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use tracing::trace;

use crate::{
    core::{
        error::{PrefError, Result},
        foundation,
        types::{Domain, PrefValue},
    },
    store::{KeyValueStore, RegisteredDefaults},
};

/// Store backed by CFPreferences for one user or global domain.
///
/// Every write is synchronized to disk before returning.
#[derive(Debug)]
pub struct CfStore {
    cf_name: String,
    defaults: RegisteredDefaults,
}

impl CfStore {
    pub fn new(domain: &Domain) -> Result<Self> {
        let cf_name = domain.get_cf_name().ok_or_else(|| {
            PrefError::Backend(format!("{domain} has no CoreFoundation domain name"))
        })?;
        Ok(Self {
            cf_name,
            defaults: RegisteredDefaults::default(),
        })
    }

    /// All application domains known to CFPreferences for the current user.
    pub fn list_domains() -> Result<Vec<Domain>> {
        Ok(foundation::list_domains()?
            .into_iter()
            .map(Domain::User)
            .collect())
    }
}

impl KeyValueStore for CfStore {
    fn get(&self, key: &str) -> Result<Option<PrefValue>> {
        trace!(domain = %self.cf_name, key, "CFPreferences read");
        Ok(self
            .defaults
            .resolve(key, foundation::read_pref(&self.cf_name, key)))
    }

    fn set(&mut self, key: &str, value: PrefValue) -> Result<()> {
        foundation::write_pref(&self.cf_name, key, &value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        foundation::delete_key(&self.cf_name, key)
    }

    fn register_defaults(&mut self, defaults: HashMap<String, PrefValue>) -> Result<()> {
        self.defaults.merge(defaults);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(foundation::key_list(&self.cf_name))
    }
}
