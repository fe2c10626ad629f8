// SPDX-License-Identifier: MIT

//! Observable bindings for list-typed preferences.
//!
//! A [`ListBinding`] keeps a persisted sequence (one store key holding an
//! array of scalars) in step with a collection of [`ElementProxy`] records
//! that a list or table control can edit one by one. The store is the source
//! of truth: every mutation re-reads and re-writes the whole sequence.
//!
//! After every reconciliation, `proxies[i].index() == Some(i)` and the
//! persisted sequence equals the proxies' values in order.
//!
//! ```text
//! store["Section.items"] = [A, B, C]       current_proxies() = [A@0, B@1, C@2]
//!
//! observer drops B, appends X:             [A@0, C@2, X@-]
//! replace_proxies(...)                     store = [A, C, X], proxies = [A@0, C@1, X@2]
//! ```

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use tracing::{debug, warn};

use crate::{
    core::{
        error::{PrefError, Result},
        types::{PrefValue, ValueKind},
    },
    store::{KeyValueStore, StoreHandle},
};

/// Shared, mutable handle to one proxy.
pub type ProxyRef = Rc<RefCell<ElementProxy>>;

/// The observer-facing proxy collection. Its identity is stable.
pub type ProxyList = Rc<RefCell<Vec<ProxyRef>>>;

/// One element of a persisted list, addressable on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProxy {
    key_path: Rc<str>,
    index: Option<usize>,
    value: PrefValue,
    detached: bool,
}

impl ElementProxy {
    fn committed(key_path: Rc<str>, index: usize, value: PrefValue) -> Self {
        Self {
            key_path,
            index: Some(index),
            value,
            detached: false,
        }
    }

    /// Key of the list this proxy belongs to.
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// Position in the persisted sequence; `None` until the proxy is committed.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn value(&self) -> &PrefValue {
        &self.value
    }

    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PrefValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is an append that has not reached the store yet.
    pub fn is_pending(&self) -> bool {
        self.index.is_none() && !self.detached
    }

    /// Whether reconciliation dropped this proxy from its list.
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// Synchronizes one persisted list with its proxy collection.
pub struct ListBinding {
    key_path: Rc<str>,
    store: StoreHandle,
    /// Collection handed to the observer.
    live: RefCell<Option<ProxyList>>,
    /// Contents for `live` that arrived while the observer held a borrow of it.
    staged: RefCell<Option<Vec<ProxyRef>>>,
    /// Proxies as of the last reconciliation, ordered by index.
    committed: RefCell<Vec<ProxyRef>>,
}

impl std::fmt::Debug for ListBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListBinding")
            .field("key_path", &self.key_path)
            .field("materialized", &self.live.borrow().is_some())
            .field("committed", &self.committed.borrow().len())
            .finish()
    }
}

impl ListBinding {
    pub fn new(key_path: impl Into<String>, store: StoreHandle) -> Self {
        Self {
            key_path: Rc::from(key_path.into()),
            store,
            live: RefCell::new(None),
            staged: RefCell::new(None),
            committed: RefCell::new(Vec::new()),
        }
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// Reads the persisted sequence. A missing key reads as an empty list.
    pub fn values(&self) -> Result<Vec<PrefValue>> {
        match self.store.borrow().get(&self.key_path)? {
            None => Ok(Vec::new()),
            Some(PrefValue::Array(items)) => Ok(items),
            Some(other) => {
                warn!(
                    key = %self.key_path,
                    kind = %other.kind(),
                    "list preference holds a non-array value"
                );
                Err(PrefError::TypeMismatch {
                    expected: ValueKind::Array,
                    got: other.kind(),
                })
            }
        }
    }

    /// Returns the live proxy collection, building it from the store on first use.
    ///
    /// Repeated calls return the same collection (`Rc::ptr_eq`) until
    /// [`ListBinding::invalidate`] runs.
    pub fn current_proxies(&self) -> Result<ProxyList> {
        if let Some(live) = self.live.borrow().as_ref() {
            self.apply_staged(live);
            return Ok(Rc::clone(live));
        }

        let proxies: Vec<ProxyRef> = self
            .values()?
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                Rc::new(RefCell::new(ElementProxy::committed(
                    Rc::clone(&self.key_path),
                    index,
                    value,
                )))
            })
            .collect();
        debug!(key = %self.key_path, len = proxies.len(), "materialized list proxies");

        let live = Rc::new(RefCell::new(proxies.clone()));
        *self.committed.borrow_mut() = proxies;
        *self.live.borrow_mut() = Some(Rc::clone(&live));
        Ok(live)
    }

    /// Creates a proxy for a value that is about to be appended.
    ///
    /// The proxy has no index until it passes through
    /// [`ListBinding::replace_proxies`] or [`ListBinding::set_element_value`].
    pub fn new_proxy(&self, value: impl Into<PrefValue>) -> ProxyRef {
        Rc::new(RefCell::new(ElementProxy {
            key_path: Rc::clone(&self.key_path),
            index: None,
            value: value.into(),
            detached: false,
        }))
    }

    /// Reconciles the store with `new_proxies`, the observer's edited collection.
    ///
    /// `new_proxies` may drop, reorder or keep proxies from the current
    /// collection and may contain pending proxies from
    /// [`ListBinding::new_proxy`]. Every proxy is re-indexed to its position,
    /// the whole sequence is written back, and the live collection's contents
    /// are replaced in place. Dropped proxies are detached.
    ///
    /// `new_proxies` is usually a clone of the live collection, and the caller
    /// may still be borrowing it. In that case the new contents are staged and
    /// land in the live collection on the next [`ListBinding::current_proxies`].
    pub fn replace_proxies(&self, new_proxies: Vec<ProxyRef>) -> Result<()> {
        let live = self.current_proxies()?;
        let mut committed = self.committed.borrow_mut();

        for proxy in &new_proxies {
            let proxy = proxy
                .try_borrow_mut()
                .map_err(|_| PrefError::ProxyBorrowed(self.key_path.to_string()))?;
            self.check_owner(&proxy)?;
            if let Some(index) = proxy.index
                && index >= committed.len()
            {
                return Err(self.out_of_range(index, committed.len()));
            }
        }
        for proxy in committed.iter() {
            if proxy.try_borrow_mut().is_err() {
                return Err(PrefError::ProxyBorrowed(self.key_path.to_string()));
            }
        }

        let mut survivors = committed.clone();
        let mut removed = Vec::new();
        if new_proxies.len() < survivors.len() {
            let keep: HashSet<usize> = new_proxies
                .iter()
                .filter_map(|p| p.borrow().index)
                .collect();
            let mut doomed: Vec<usize> = (0..survivors.len())
                .filter(|index| !keep.contains(index))
                .collect();
            // highest first so the remaining positions stay valid
            doomed.sort_unstable_by(|a, b| b.cmp(a));
            for index in doomed {
                removed.push(survivors.remove(index));
            }
        }

        let sequence: Vec<PrefValue> = new_proxies
            .iter()
            .map(|p| p.borrow().value.clone())
            .collect();
        self.store
            .borrow_mut()
            .set(&self.key_path, PrefValue::Array(sequence))?;

        // same-length edits can still drop proxies, so match by identity too
        removed.extend(
            survivors
                .into_iter()
                .filter(|old| !new_proxies.iter().any(|p| Rc::ptr_eq(p, old))),
        );
        for proxy in &removed {
            if !new_proxies.iter().any(|p| Rc::ptr_eq(p, proxy)) {
                let mut proxy = proxy.borrow_mut();
                proxy.index = None;
                proxy.detached = true;
            }
        }
        for (index, proxy) in new_proxies.iter().enumerate() {
            let mut proxy = proxy.borrow_mut();
            proxy.index = Some(index);
            proxy.detached = false;
        }

        debug!(
            key = %self.key_path,
            len = new_proxies.len(),
            removed = removed.len(),
            "reconciled list proxies"
        );
        *committed = new_proxies.clone();
        match live.try_borrow_mut() {
            Ok(mut live) => *live = new_proxies,
            Err(_) => {
                debug!(key = %self.key_path, "live proxies borrowed, staging update");
                *self.staged.borrow_mut() = Some(new_proxies);
            }
        }
        Ok(())
    }

    /// Reconciles after the observer edited the live collection in place.
    pub fn sync(&self) -> Result<()> {
        let live = self.current_proxies()?;
        let snapshot = live.borrow().clone();
        self.replace_proxies(snapshot)
    }

    /// Sets one proxy's value and writes it through to the store.
    ///
    /// A committed proxy overwrites its own slot. A pending proxy is appended
    /// and receives the index it landed at.
    pub fn set_element_value(&self, proxy: &ProxyRef, value: impl Into<PrefValue>) -> Result<()> {
        let value = value.into();
        // materialize first so the append below is not read back as a second proxy
        self.current_proxies()?;

        let mut guard = proxy
            .try_borrow_mut()
            .map_err(|_| PrefError::ProxyBorrowed(self.key_path.to_string()))?;
        self.check_owner(&guard)?;
        if guard.detached {
            return Err(PrefError::DetachedProxy(self.key_path.to_string()));
        }
        let index = guard.index;

        let mut sequence = self.values()?;
        let index = match index {
            Some(index) => {
                let len = sequence.len();
                let slot = sequence
                    .get_mut(index)
                    .ok_or_else(|| self.out_of_range(index, len))?;
                *slot = value.clone();
                self.write(sequence)?;
                index
            }
            None => {
                sequence.push(value.clone());
                let index = sequence.len() - 1;
                self.write(sequence)?;
                self.committed.borrow_mut().push(Rc::clone(proxy));
                index
            }
        };

        guard.value = value;
        guard.index = Some(index);
        Ok(())
    }

    /// Drops the materialized collection; the next read rebuilds it from the store.
    ///
    /// Every proxy handed out so far is detached, since the store may no longer
    /// hold its element at its index.
    pub fn invalidate(&self) {
        let live = self.live.borrow_mut().take();
        let staged = self.staged.borrow_mut().take();
        let committed = std::mem::take(&mut *self.committed.borrow_mut());

        let live = live
            .and_then(|live| live.try_borrow().ok().map(|l| l.clone()))
            .unwrap_or_default();
        for proxy in committed.iter().chain(&live).chain(staged.iter().flatten()) {
            if let Ok(mut proxy) = proxy.try_borrow_mut() {
                proxy.index = None;
                proxy.detached = true;
            }
        }
    }

    fn apply_staged(&self, live: &ProxyList) {
        let Ok(mut live) = live.try_borrow_mut() else {
            return;
        };
        if let Some(staged) = self.staged.borrow_mut().take() {
            *live = staged;
        }
    }

    fn write(&self, sequence: Vec<PrefValue>) -> Result<()> {
        debug!(key = %self.key_path, len = sequence.len(), "writing list");
        self.store
            .borrow_mut()
            .set(&self.key_path, PrefValue::Array(sequence))
    }

    fn check_owner(&self, proxy: &ElementProxy) -> Result<()> {
        if proxy.key_path == self.key_path {
            Ok(())
        } else {
            Err(PrefError::ForeignProxy {
                key: self.key_path.to_string(),
                proxy_key: proxy.key_path.to_string(),
            })
        }
    }

    fn out_of_range(&self, index: usize, len: usize) -> PrefError {
        PrefError::IndexOutOfRange {
            key: self.key_path.to_string(),
            index,
            len,
        }
    }
}
