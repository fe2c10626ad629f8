// SPDX-License-Identifier: MIT

//! Preference sections: named groups of properties bound to store keys.
//!
//! A section type implements [`Section`] and declares its properties once.
//! Each property lives under `"<SectionName>.<property>"` in the store, and
//! its default is registered through the [`PreferenceRegistry`] when the
//! owning [`Preferences`] is built.
//!
//! ```
//! use defaults_bind::{MemoryStore, Preferences, Section, SectionBuilder, shared};
//!
//! struct General;
//!
//! impl Section for General {
//!     fn name() -> String {
//!         "General".into()
//!     }
//!
//!     fn declare(section: &mut SectionBuilder) {
//!         section
//!             .scalar("launchAtLogin", false)
//!             .string_list("excludedApps", ["Terminal"]);
//!     }
//! }
//!
//! # fn main() -> defaults_bind::Result<()> {
//! let prefs = Preferences::builder(shared(MemoryStore::new()))
//!     .section::<General>()
//!     .build()?;
//! let general = prefs.section::<General>()?;
//!
//! assert!(!general.get_as::<bool>("launchAtLogin")?);
//! general.set("launchAtLogin", true)?;
//! assert!(general.get_as::<bool>("launchAtLogin")?);
//! assert_eq!(general.list("excludedApps")?.values()?.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::{
    any::{TypeId, type_name},
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::{
    core::{
        error::{PrefError, Result},
        types::{PrefValue, ValueKind},
    },
    list::ListBinding,
    registry::PreferenceRegistry,
    store::{KeyValueStore, StoreHandle},
};

/// A statically declared group of preferences.
pub trait Section: 'static {
    /// Declares the section's properties and their defaults.
    fn declare(section: &mut SectionBuilder);

    /// Prefix of every key in the section.
    ///
    /// Defaults to the type's path with `::` replaced by `.`.
    fn name() -> String {
        section_name(type_name::<Self>())
    }
}

/// Turns a Rust type path into a key prefix (`app::prefs::General` → `app.prefs.General`).
pub fn section_name(type_path: &str) -> String {
    type_path.replace("::", ".")
}

/// Whether a property holds one value or an observable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ValueKind),
    List,
}

/// One declared property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub key_path: String,
    pub default: PrefValue,
    pub kind: PropertyKind,
}

/// Collects property declarations for one section.
#[derive(Debug)]
pub struct SectionBuilder {
    name: String,
    properties: Vec<PropertySpec>,
}

impl SectionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Declares a scalar property. Redeclaring a name replaces it.
    pub fn scalar(&mut self, name: &str, default: impl Into<PrefValue>) -> &mut Self {
        let default = default.into();
        let kind = PropertyKind::Scalar(default.kind());
        self.push(name, default, kind)
    }

    /// Declares a list-of-strings property exposed through a [`ListBinding`].
    pub fn string_list<I, S>(&mut self, name: &str, defaults: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default = PrefValue::Array(
            defaults
                .into_iter()
                .map(|s| PrefValue::String(s.into()))
                .collect(),
        );
        self.push(name, default, PropertyKind::List)
    }

    fn push(&mut self, name: &str, default: PrefValue, kind: PropertyKind) -> &mut Self {
        self.properties.retain(|p| p.name != name);
        self.properties.push(PropertySpec {
            name: name.to_string(),
            key_path: format!("{}.{}", self.name, name),
            default,
            kind,
        });
        self
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }
}

/// A declared section bound to the shared store.
///
/// Holds no values itself; every read and write goes straight to the store.
pub struct PreferenceSection {
    name: String,
    properties: BTreeMap<String, PropertySpec>,
    store: StoreHandle,
    lists: RefCell<HashMap<String, Rc<ListBinding>>>,
}

impl std::fmt::Debug for PreferenceSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceSection")
            .field("name", &self.name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PreferenceSection {
    fn new(builder: SectionBuilder, store: StoreHandle) -> Self {
        Self {
            name: builder.name,
            properties: builder
                .properties
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            store,
            lists: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared properties, ordered by name.
    pub fn properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.values()
    }

    pub fn property(&self, name: &str) -> Result<&PropertySpec> {
        self.properties
            .get(name)
            .ok_or_else(|| PrefError::UnknownProperty {
                section: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Reads a property from the store.
    ///
    /// Falls back to the declared default when the store has neither a value
    /// nor a registered default for the key.
    pub fn get(&self, name: &str) -> Result<PrefValue> {
        let prop = self.property(name)?;
        let value = self.store.borrow().get(&prop.key_path)?;
        Ok(value.unwrap_or_else(|| prop.default.clone()))
    }

    /// Reads a property converted to a native type.
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<PrefValue, Error = PrefError>,
    {
        T::try_from(self.get(name)?)
    }

    /// Writes a property immediately. The value's kind is not checked.
    pub fn set(&self, name: &str, value: impl Into<PrefValue>) -> Result<()> {
        let prop = self.property(name)?;
        self.store.borrow_mut().set(&prop.key_path, value.into())?;
        self.invalidate_list(name);
        Ok(())
    }

    /// Forgets the stored value so the registered default applies again.
    pub fn reset(&self, name: &str) -> Result<()> {
        let prop = self.property(name)?;
        self.store.borrow_mut().remove(&prop.key_path)?;
        self.invalidate_list(name);
        Ok(())
    }

    /// The binding for a list property, created on first use.
    pub fn list(&self, name: &str) -> Result<Rc<ListBinding>> {
        let prop = self.property(name)?;
        if prop.kind != PropertyKind::List {
            return Err(PrefError::NotAList(prop.key_path.clone()));
        }
        let mut lists = self.lists.borrow_mut();
        let binding = lists.entry(name.to_string()).or_insert_with(|| {
            Rc::new(ListBinding::new(
                prop.key_path.clone(),
                Rc::clone(&self.store),
            ))
        });
        Ok(Rc::clone(binding))
    }

    fn invalidate_list(&self, name: &str) {
        if let Some(binding) = self.lists.borrow().get(name) {
            binding.invalidate();
        }
    }
}

/// Every declared section of an application, sharing one store.
pub struct Preferences {
    store: StoreHandle,
    registry: PreferenceRegistry,
    sections: HashMap<TypeId, Rc<PreferenceSection>>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("registry", &self.registry)
            .field("sections", &self.sections.values().collect::<Vec<_>>())
            .finish()
    }
}

thread_local! {
    static INSTALLED: OnceCell<Rc<Preferences>> = const { OnceCell::new() };
}

impl Preferences {
    pub fn builder(store: StoreHandle) -> PreferencesBuilder {
        PreferencesBuilder {
            store,
            sections: Vec::new(),
        }
    }

    /// The singleton instance of section `T`.
    pub fn section<T: Section>(&self) -> Result<Rc<PreferenceSection>> {
        self.sections
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| PrefError::UnknownSection(T::name()))
    }

    pub fn section_named(&self, name: &str) -> Option<Rc<PreferenceSection>> {
        self.sections.values().find(|s| s.name == name).cloned()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Rc<PreferenceSection>> {
        self.sections.values()
    }

    /// Defaults registered for every declared property.
    pub fn registry(&self) -> &PreferenceRegistry {
        &self.registry
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Makes this instance the one returned by [`Preferences::current`].
    ///
    /// Installation happens once, at startup, on the UI thread.
    pub fn install(self) -> Result<Rc<Preferences>> {
        let prefs = Rc::new(self);
        INSTALLED.with(|cell| {
            cell.set(Rc::clone(&prefs))
                .map_err(|_| PrefError::AlreadyInstalled)
        })?;
        Ok(prefs)
    }

    /// The installed instance for this thread, if any.
    pub fn current() -> Option<Rc<Preferences>> {
        INSTALLED.with(|cell| cell.get().cloned())
    }
}

type Declare = fn(&mut SectionBuilder);

/// Declares sections, then registers every default with the store in one go.
pub struct PreferencesBuilder {
    store: StoreHandle,
    sections: Vec<(TypeId, String, Declare)>,
}

impl PreferencesBuilder {
    pub fn section<T: Section>(mut self) -> Self {
        self.sections.push((TypeId::of::<T>(), T::name(), T::declare));
        self
    }

    /// Declares all sections and commits their defaults to the store.
    pub fn build(self) -> Result<Preferences> {
        let mut registry = PreferenceRegistry::new();
        let mut sections = HashMap::new();

        for (type_id, name, declare) in self.sections {
            if sections.contains_key(&type_id) {
                return Err(PrefError::DuplicateSection(name));
            }
            let mut builder = SectionBuilder::new(name);
            declare(&mut builder);
            for prop in builder.properties() {
                registry.register(prop.key_path.clone(), prop.default.clone())?;
            }
            debug!(
                section = %builder.name,
                properties = builder.properties.len(),
                "declared preference section"
            );
            let section = PreferenceSection::new(builder, Rc::clone(&self.store));
            sections.insert(type_id, Rc::new(section));
        }

        registry.commit(&mut *self.store.borrow_mut())?;

        Ok(Preferences {
            store: self.store,
            registry,
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::{MemoryStore, shared};

    struct General;

    impl Section for General {
        fn declare(section: &mut SectionBuilder) {
            section
                .scalar("fontSize", 12)
                .scalar("theme", "light")
                .scalar("spellCheck", true)
                .string_list("recentFiles", Vec::<String>::new());
        }
    }

    struct Named;

    impl Section for Named {
        fn name() -> String {
            "Named".into()
        }

        fn declare(section: &mut SectionBuilder) {
            section.scalar("ratio", 0.5);
        }
    }

    fn prefs() -> Result<Preferences> {
        Preferences::builder(shared(MemoryStore::new()))
            .section::<General>()
            .section::<Named>()
            .build()
    }

    #[test]
    fn key_paths_follow_the_type_path() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;

        assert_eq!(general.name(), "defaults_bind.section.tests.General");
        assert_eq!(
            general.property("theme")?.key_path,
            "defaults_bind.section.tests.General.theme"
        );
        assert_eq!(prefs.section::<Named>()?.property("ratio")?.key_path, "Named.ratio");
        assert_eq!(section_name("a::b::C"), "a.b.C");
        Ok(())
    }

    #[test]
    fn defaults_are_registered_with_the_store() -> Result<()> {
        let prefs = prefs()?;
        assert!(prefs.registry().is_committed());
        assert_eq!(prefs.registry().len(), 5);

        let stored = prefs.store().borrow().get("Named.ratio")?;
        assert_eq!(stored, Some(PrefValue::Float(0.5)));
        Ok(())
    }

    #[test]
    fn set_writes_through_and_reset_restores_default() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;

        assert_eq!(general.get_as::<i64>("fontSize")?, 12);
        general.set("fontSize", 14)?;
        assert_eq!(general.get_as::<i64>("fontSize")?, 14);
        assert_eq!(
            prefs
                .store()
                .borrow()
                .get("defaults_bind.section.tests.General.fontSize")?,
            Some(PrefValue::Integer(14))
        );

        general.reset("fontSize")?;
        assert_eq!(general.get_as::<i64>("fontSize")?, 12);
        Ok(())
    }

    #[test]
    fn set_does_not_validate_kinds() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;

        general.set("spellCheck", "maybe")?;
        assert_eq!(general.get("spellCheck")?, PrefValue::from("maybe"));
        assert!(matches!(
            general.get_as::<bool>("spellCheck"),
            Err(PrefError::TypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn unknown_names_are_errors() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;

        assert!(matches!(
            general.get("missing"),
            Err(PrefError::UnknownProperty { .. })
        ));
        assert!(matches!(general.list("theme"), Err(PrefError::NotAList(_))));

        let bare = Preferences::builder(shared(MemoryStore::new())).build()?;
        assert!(matches!(
            bare.section::<General>(),
            Err(PrefError::UnknownSection(_))
        ));
        Ok(())
    }

    #[test]
    fn sections_and_lists_are_singletons() -> Result<()> {
        let prefs = prefs()?;
        let a = prefs.section::<General>()?;
        let b = prefs.section::<General>()?;
        assert!(Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&a.list("recentFiles")?, &b.list("recentFiles")?));

        let named = prefs.section_named("Named");
        assert!(named.is_some_and(|s| s.name() == "Named"));
        Ok(())
    }

    #[test]
    fn set_on_a_list_property_refreshes_its_proxies() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;
        let recent = general.list("recentFiles")?;
        assert!(recent.current_proxies()?.borrow().is_empty());

        general.set("recentFiles", vec!["a.txt", "b.txt"])?;

        let proxies = recent.current_proxies()?;
        assert_eq!(proxies.borrow().len(), 2);
        assert_eq!(
            general.get_as::<Vec<String>>("recentFiles")?,
            vec!["a.txt".to_string(), "b.txt".to_string()]
        );
        Ok(())
    }

    #[test]
    fn stale_list_proxies_cannot_write_after_set() -> Result<()> {
        let prefs = prefs()?;
        let general = prefs.section::<General>()?;
        general.set("recentFiles", vec!["a", "b", "c"])?;
        let recent = general.list("recentFiles")?;
        let old = recent.current_proxies()?.borrow().clone();

        general.set("recentFiles", vec!["x", "y", "z"])?;

        assert!(old[1].borrow().is_detached());
        assert!(matches!(
            recent.set_element_value(&old[1], "Q"),
            Err(PrefError::DetachedProxy(_))
        ));
        assert_eq!(
            general.get_as::<Vec<String>>("recentFiles")?,
            vec!["x".to_string(), "y".to_string(), "z".to_string()]
        );

        general.reset("recentFiles")?;
        let fresh = recent.current_proxies()?.borrow().clone();
        assert!(fresh.is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let result = Preferences::builder(shared(MemoryStore::new()))
            .section::<Named>()
            .section::<Named>()
            .build();
        assert!(matches!(result, Err(PrefError::DuplicateSection(name)) if name == "Named"));
    }

    #[test]
    fn install_happens_once_per_thread() -> Result<()> {
        // each test runs on its own thread
        assert!(Preferences::current().is_none());
        let installed = prefs()?.install()?;
        assert!(Preferences::current().is_some_and(|p| Rc::ptr_eq(&p, &installed)));
        assert!(matches!(prefs()?.install(), Err(PrefError::AlreadyInstalled)));
        Ok(())
    }
}
