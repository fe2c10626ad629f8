// SPDX-License-Identifier: MIT

//! Library API for defaults-bind: typed preference sections and observable
//! list bindings over a user-defaults store.
//!
//! - [`store`]: the key-value stores (CFPreferences, plist files, memory).
//! - [`registry`]: defaults collected from every declared section.
//! - [`section`]: sections, their properties and the [`Preferences`] context.
//! - [`list`]: [`ListBinding`], which keeps a persisted list and its
//!   [`ElementProxy`] collection in sync for list and table controls.

mod core;

#[cfg(feature = "cli")]
pub mod cli;
pub mod list;
pub mod registry;
pub mod section;
pub mod store;

pub use crate::core::error::{PrefError, Result};
pub use crate::core::types::{Domain, PrefValue, ValueKind};
pub use list::{ElementProxy, ListBinding, ProxyList, ProxyRef};
pub use registry::PreferenceRegistry;
pub use section::{
    PreferenceSection, Preferences, PreferencesBuilder, PropertyKind, PropertySpec, Section,
    SectionBuilder,
};
pub use store::{KeyValueStore, MemoryStore, PlistStore, StoreHandle, open_store, shared};
