//! Per-unit relation settings.
//!
//! A [`Settings`] node buffers changes in memory and only makes them durable
//! on [`Settings::write`]. Writes are merged key by key into the latest
//! persisted document, so two writers touching distinct keys never clobber
//! each other.


use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::constants::MAX_TXN_ATTEMPTS;
use crate::Collection;
use crate::Error;
use crate::Result;
use crate::Store;
use crate::TxnOp;

/// Flat map of setting names to structured values
pub type SettingsMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A single key changed by [`Settings::write`]
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    pub kind: ItemChangeKind,
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl fmt::Display for ItemChange {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.kind {
            ItemChangeKind::Added => write!(f, "setting added: {} = {:?}", self.key, self.new),
            ItemChangeKind::Modified => {
                write!(f, "setting modified: {} = {:?} (was {:?})", self.key, self.new, self.old)
            }
            ItemChangeKind::Deleted => write!(f, "setting deleted: {} (was {:?})", self.key, self.old),
        }
    }
}

pub struct Settings {
    store: Arc<dyn Store>,
    key: String,
    /// Last state read from or written to the store
    disk: SettingsMap,
    /// Local state including unwritten changes
    core: SettingsMap,
}

impl fmt::Debug for Settings {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Settings")
            .field("key", &self.key)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// An empty node for `key` that has not been read from the store.
    pub(crate) fn new(
        store: Arc<dyn Store>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            disk: SettingsMap::new(),
            core: SettingsMap::new(),
        }
    }

    /// Reads the node for `key`; a missing document yields an empty node.
    pub(crate) fn load(
        store: Arc<dyn Store>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let mut node = Self::new(store, key);
        node.read()?;
        Ok(node)
    }

    /// Reads the persisted map for `key`, or `None` if there is none.
    pub(crate) fn fetch(
        store: &dyn Store,
        key: &str,
    ) -> Result<Option<SettingsMap>> {
        Ok(fetch_raw(store, key)?.map(|(map, _)| map))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn keys(&self) -> Vec<String> {
        self.core.keys().cloned().collect()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.core.get(key)
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.core.insert(key.into(), value.into());
    }

    /// Sets every entry of `map`, keeping keys not mentioned in it.
    pub fn update(
        &mut self,
        map: SettingsMap,
    ) {
        self.core.extend(map);
    }

    pub fn delete(
        &mut self,
        key: &str,
    ) {
        self.core.remove(key);
    }

    /// A copy of the node's current contents, including unwritten changes.
    pub fn map(&self) -> SettingsMap {
        self.core.clone()
    }

    /// Rereads the node from the store, discarding unwritten changes.
    pub fn read(&mut self) -> Result<()> {
        let map = Self::fetch(self.store.as_ref(), &self.key)?.unwrap_or_default();
        self.disk = map.clone();
        self.core = map;
        Ok(())
    }

    /// Persists the changes made since the last read or write.
    ///
    /// Only changed keys are merged into the stored document. Returns the
    /// applied changes sorted by key; an empty list means nothing was written.
    pub fn write(&mut self) -> Result<Vec<ItemChange>> {
        let changes = diff_settings(&self.disk, &self.core);
        if changes.is_empty() {
            return Ok(changes);
        }

        let mut last_err = None;
        for attempt in 0..MAX_TXN_ATTEMPTS {
            let (mut latest, current) = match fetch_raw(self.store.as_ref(), &self.key)? {
                Some((map, bytes)) => (map, Some(bytes)),
                None => (SettingsMap::new(), None),
            };
            apply_changes(&mut latest, &changes);
            let updated = serde_json::to_vec(&latest)?;

            match self.store.run(vec![TxnOp::compare_and_swap(
                Collection::Settings,
                self.key.as_str(),
                current,
                updated,
            )]) {
                Ok(()) => {
                    debug!(key = %self.key, changes = changes.len(), "settings written");
                    self.disk = self.core.clone();
                    return Ok(changes);
                }
                Err(e) if e.is_txn_aborted() => {
                    debug!(key = %self.key, attempt, "settings write raced, merging again");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Fatal(format!("cannot write settings {:?}", self.key))))
    }
}

fn fetch_raw(
    store: &dyn Store,
    key: &str,
) -> Result<Option<(SettingsMap, Vec<u8>)>> {
    match store.find_by_id(Collection::Settings, key)? {
        Some(bytes) => {
            let map: SettingsMap = serde_json::from_slice(&bytes)?;
            Ok(Some((map, bytes)))
        }
        None => Ok(None),
    }
}

/// Changes that turn `old` into `new`, sorted by key.
pub(crate) fn diff_settings(
    old: &SettingsMap,
    new: &SettingsMap,
) -> Vec<ItemChange> {
    let mut changes = Vec::new();
    for (key, old_value) in old {
        match new.get(key) {
            None => changes.push(ItemChange {
                kind: ItemChangeKind::Deleted,
                key: key.clone(),
                old: Some(old_value.clone()),
                new: None,
            }),
            Some(new_value) if new_value != old_value => changes.push(ItemChange {
                kind: ItemChangeKind::Modified,
                key: key.clone(),
                old: Some(old_value.clone()),
                new: Some(new_value.clone()),
            }),
            Some(_) => {}
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.push(ItemChange {
                kind: ItemChangeKind::Added,
                key: key.clone(),
                old: None,
                new: Some(new_value.clone()),
            });
        }
    }
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

fn apply_changes(
    map: &mut SettingsMap,
    changes: &[ItemChange],
) {
    for change in changes {
        match &change.new {
            Some(value) => {
                map.insert(change.key.clone(), value.clone());
            }
            None => {
                map.remove(&change.key);
            }
        }
    }
}
