// SPDX-License-Identifier: MIT

//! Plist-file store.
//!
//! The whole root dictionary is held in memory and every mutation rewrites
//! the file atomically (temporary file + rename), keeping the original
//! encoding (XML or binary) and permissions.

use std::{
    collections::HashMap,
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use plist::Value;
use tracing::{debug, trace};

use crate::{
    core::{
        error::{PrefError, Result},
        types::{APPLE_EPOCH_UNIX, PrefValue},
    },
    store::{KeyValueStore, RegisteredDefaults},
};

/// Store backed by a single plist file whose root is a dictionary.
#[derive(Debug)]
pub struct PlistStore {
    path: PathBuf,
    root: HashMap<String, PrefValue>,
    is_binary: bool,
    defaults: RegisteredDefaults,
}

impl PlistStore {
    /// Loads `path`, starting from an empty dictionary when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (root, is_binary) = load_plist(&path)?;
        debug!(path = %path.display(), keys = root.len(), is_binary, "loaded plist store");
        Ok(Self {
            path,
            root,
            is_binary,
            defaults: RegisteredDefaults::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole root dictionary.
    pub fn snapshot(&self) -> PrefValue {
        PrefValue::Dictionary(self.root.clone())
    }

    /// Re-reads the file, dropping any in-memory view of it.
    pub fn reload(&mut self) -> Result<()> {
        let (root, is_binary) = load_plist(&self.path)?;
        self.root = root;
        self.is_binary = is_binary;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        save_plist(&self.path, &self.root, self.is_binary)
    }
}

impl KeyValueStore for PlistStore {
    fn get(&self, key: &str) -> Result<Option<PrefValue>> {
        trace!(key, "plist read");
        Ok(self.defaults.resolve(key, self.root.get(key).cloned()))
    }

    fn set(&mut self, key: &str, value: PrefValue) -> Result<()> {
        let previous = self.root.insert(key.to_string(), value);
        self.save().inspect_err(|_| match previous {
            Some(previous) => {
                self.root.insert(key.to_string(), previous);
            }
            None => {
                self.root.remove(key);
            }
        })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(previous) = self.root.remove(key) {
            self.save().inspect_err(|_| {
                self.root.insert(key.to_string(), previous);
            })?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.root.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn register_defaults(&mut self, defaults: HashMap<String, PrefValue>) -> Result<()> {
        self.defaults.merge(defaults);
        Ok(())
    }
}

fn load_plist(path: &Path) -> Result<(HashMap<String, PrefValue>, bool)> {
    let buf = match fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((HashMap::new(), false)),
        Err(e) => return Err(e.into()),
    };

    // try to parse as XML first, and if that fails, fallback to another format
    let (value, is_binary) = match Value::from_reader_xml(Cursor::new(&buf[..])) {
        Ok(value) => (value, false),
        Err(_) => (Value::from_reader(Cursor::new(&buf[..]))?, true),
    };

    match plist_to_prefvalue(&value)? {
        PrefValue::Dictionary(root) => Ok((root, is_binary)),
        other => Err(PrefError::Backend(format!(
            "{} has a {} root, expected a dictionary",
            path.display(),
            other.get_type()
        ))),
    }
}

fn save_plist(path: &Path, root: &HashMap<String, PrefValue>, is_binary: bool) -> Result<()> {
    let value = Value::Dictionary(
        root.iter()
            .map(|(k, v)| Ok((k.clone(), prefvalue_to_plist(v)?)))
            .collect::<Result<_>>()?,
    );

    let mut buf = Vec::new();
    if is_binary {
        value.to_writer_binary(&mut buf)?;
    } else {
        value.to_writer_xml(&mut buf)?;
    }

    let dir = path
        .parent()
        .ok_or_else(|| PrefError::Backend(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| PrefError::Backend(format!("{} has no file name", path.display())))?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }

    let orig_perm = fs::metadata(path).ok().map(|m| m.permissions());
    let tmp_path = dir.join(format!("{}.tmp", file_name.to_string_lossy()));

    let mut tmp_file = fs::File::create(&tmp_path)?;
    tmp_file.write_all(&buf)?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    if let Some(perm) = orig_perm {
        fs::set_permissions(path, perm)?;
    }

    debug!(path = %path.display(), bytes = buf.len(), "wrote plist store");
    Ok(())
}

fn plist_to_prefvalue(val: &Value) -> Result<PrefValue> {
    let val = match val {
        Value::String(s) => PrefValue::String(s.clone()),
        Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
            (Some(i), _) => PrefValue::Integer(i),
            (None, Some(u)) => PrefValue::Unsigned(u),
            (None, None) => {
                return Err(PrefError::Backend(format!("unsupported plist integer: {i:?}")));
            }
        },
        Value::Real(f) => PrefValue::Float(*f),
        Value::Boolean(b) => PrefValue::Boolean(*b),
        Value::Array(arr) => PrefValue::Array(
            arr.iter()
                .map(plist_to_prefvalue)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Dictionary(dict) => PrefValue::Dictionary(
            dict.iter()
                .map(|(k, v)| Ok((k.clone(), plist_to_prefvalue(v)?)))
                .collect::<Result<HashMap<_, _>>>()?,
        ),
        Value::Data(data) => PrefValue::Data(data.clone()),
        Value::Date(date) => {
            let system_time: SystemTime = date.clone().into();
            let unix = match system_time.duration_since(UNIX_EPOCH) {
                Ok(d) => d.as_secs_f64(),
                Err(e) => -e.duration().as_secs_f64(),
            };
            PrefValue::Date(unix - APPLE_EPOCH_UNIX as f64)
        }
        Value::Uid(uid) => PrefValue::Uid(uid.get()),
        other => {
            return Err(PrefError::Backend(format!(
                "unsupported plist value: {other:?}"
            )));
        }
    };

    Ok(val)
}

fn prefvalue_to_plist(val: &PrefValue) -> Result<Value> {
    let val = match val {
        PrefValue::String(s) => Value::String(s.clone()),
        PrefValue::Integer(i) => Value::Integer((*i).into()),
        PrefValue::Unsigned(u) => Value::Integer((*u).into()),
        PrefValue::Float(f) => Value::Real(*f),
        PrefValue::Boolean(b) => Value::Boolean(*b),
        PrefValue::Array(arr) => Value::Array(
            arr.iter()
                .map(prefvalue_to_plist)
                .collect::<Result<Vec<_>>>()?,
        ),
        PrefValue::Dictionary(dict) => Value::Dictionary(
            dict.iter()
                .map(|(k, v)| Ok((k.clone(), prefvalue_to_plist(v)?)))
                .collect::<Result<_>>()?,
        ),
        PrefValue::Data(data) => Value::Data(data.clone()),
        PrefValue::Date(dt) => Value::Date(plist::Date::from(date_to_system_time(*dt)?)),
        PrefValue::Uid(uid) => Value::Uid(plist::Uid::new(*uid)),
    };

    Ok(val)
}

/// Converts a CFAbsoluteTime, rejecting values `SystemTime` cannot hold.
fn date_to_system_time(secs: f64) -> Result<SystemTime> {
    let unix = APPLE_EPOCH_UNIX as f64 + secs;
    let system_time = Duration::try_from_secs_f64(unix.abs())
        .ok()
        .and_then(|offset| {
            if unix >= 0.0 {
                UNIX_EPOCH.checked_add(offset)
            } else {
                UNIX_EPOCH.checked_sub(offset)
            }
        });
    system_time.ok_or_else(|| PrefError::InvalidValue {
        kind: "date".into(),
        raw: secs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("com.example.test.plist");

        let mut store = PlistStore::open(&path)?;
        store.set("General.name", PrefValue::from("ada"))?;
        store.set("Lists.items", PrefValue::from(vec!["a", "b"]))?;
        store.set("General.count", PrefValue::Integer(3))?;

        let reopened = PlistStore::open(&path)?;
        assert_eq!(reopened.get("General.name")?, Some(PrefValue::from("ada")));
        assert_eq!(
            reopened.get("Lists.items")?,
            Some(PrefValue::from(vec!["a", "b"]))
        );
        assert_eq!(reopened.keys()?, vec!["General.count", "General.name", "Lists.items"]);
        assert!(!path.with_file_name("com.example.test.plist.tmp").exists());
        Ok(())
    }

    #[test]
    fn binary_files_stay_binary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("binary.plist");
        let mut dict = plist::Dictionary::new();
        dict.insert("k".into(), Value::Boolean(true));
        Value::Dictionary(dict).to_file_binary(&path)?;

        let mut store = PlistStore::open(&path)?;
        assert_eq!(store.get("k")?, Some(PrefValue::Boolean(true)));
        store.set("k", PrefValue::Boolean(false))?;

        let bytes = fs::read(&path)?;
        assert!(bytes.starts_with(b"bplist00"));
        Ok(())
    }

    #[test]
    fn missing_files_start_empty_and_defaults_apply() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = PlistStore::open(dir.path().join("absent.plist"))?;
        assert_eq!(store.get("k")?, None);

        store.register_defaults(HashMap::from([("k".into(), PrefValue::Integer(7))]))?;
        assert_eq!(store.get("k")?, Some(PrefValue::Integer(7)));
        store.remove("k")?;
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn non_dictionary_roots_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("array.plist");
        Value::Array(vec![Value::Boolean(true)]).to_file_xml(&path)?;

        assert!(matches!(PlistStore::open(&path), Err(PrefError::Backend(_))));
        Ok(())
    }

    #[test]
    fn rewrites_keep_unsigned_integers_and_uids() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.plist");
        let mut dict = plist::Dictionary::new();
        dict.insert("big".into(), Value::Integer(u64::MAX.into()));
        dict.insert("uid".into(), Value::Uid(plist::Uid::new(7)));
        Value::Dictionary(dict).to_file_binary(&path)?;

        let mut store = PlistStore::open(&path)?;
        store.set("unrelated", PrefValue::from("x"))?;

        let reopened = PlistStore::open(&path)?;
        assert_eq!(reopened.get("big")?, Some(PrefValue::Unsigned(u64::MAX)));
        assert_eq!(reopened.get("uid")?, Some(PrefValue::Uid(7)));

        let Value::Dictionary(raw) = Value::from_file(&path)? else {
            panic!("root should stay a dictionary");
        };
        assert_eq!(raw.get("big"), Some(&Value::Integer(u64::MAX.into())));
        assert_eq!(raw.get("uid"), Some(&Value::Uid(plist::Uid::new(7))));
        Ok(())
    }

    #[test]
    fn unrepresentable_dates_are_rejected_without_touching_the_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dates.plist");
        let mut store = PlistStore::open(&path)?;
        store.set("when", PrefValue::Date(0.0))?;

        for bad in [f64::NAN, f64::INFINITY, 1e300] {
            assert!(matches!(
                store.set("when", PrefValue::Date(bad)),
                Err(PrefError::InvalidValue { .. })
            ));
        }

        assert_eq!(store.get("when")?, Some(PrefValue::Date(0.0)));
        assert_eq!(PlistStore::open(&path)?.get("when")?, Some(PrefValue::Date(0.0)));
        Ok(())
    }
}
