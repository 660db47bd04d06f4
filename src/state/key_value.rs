use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::request_state::{KeyValue, OrderedPairs};
use crate::config::AutosaveConfig;
use crate::debounce::Debouncer;

/// One editable row. Blank and disabled rows stay in the editor but are
/// never sent or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueItem {
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl Default for KeyValueItem {
    fn default() -> Self {
        Self {
            key: String::new(),
            value: String::new(),
            enabled: true,
        }
    }
}

impl KeyValueItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn is_effective(&self) -> bool {
        self.enabled && (!self.key.trim().is_empty() || !self.value.trim().is_empty())
    }
}

impl From<KeyValue> for KeyValueItem {
    fn from(pair: KeyValue) -> Self {
        Self::new(pair.key, pair.value)
    }
}

/// Ordered rows of a headers or parameters editor. Always holds at least
/// one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueList {
    items: Vec<KeyValueItem>,
}

impl Default for KeyValueList {
    fn default() -> Self {
        Self {
            items: vec![KeyValueItem::default()],
        }
    }
}

impl KeyValueList {
    pub fn from_items(items: Vec<KeyValueItem>) -> Self {
        if items.is_empty() {
            return Self::default();
        }
        Self { items }
    }

    /// Seed the editor from persisted pairs.
    pub fn from_pairs(pairs: &[KeyValue]) -> Self {
        Self::from_items(pairs.iter().cloned().map(KeyValueItem::from).collect())
    }

    pub fn items(&self) -> &[KeyValueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn append(&mut self, item: KeyValueItem) {
        self.items.push(item);
    }

    /// Returns `false` when nothing was removed: out of range, or the last row.
    pub fn remove(&mut self, index: usize) -> bool {
        if self.items.len() <= 1 || index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        true
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.enabled = !item.enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_key(&mut self, index: usize, key: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.key = key.into();
                true
            }
            None => false,
        }
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn effective(&self) -> OrderedPairs {
        self.items
            .iter()
            .filter(|item| item.is_effective())
            .map(|item| KeyValue::new(item.key.clone(), item.value.clone()))
            .collect()
    }
}

/// A [`KeyValueList`] whose effective pairs are pushed through a
/// [`Debouncer`] after every edit that changed something.
pub struct KeyValueField {
    list: KeyValueList,
    autosave: Debouncer<OrderedPairs>,
}

impl KeyValueField {
    pub fn new(initial: &[KeyValue], window: Duration, tx: UnboundedSender<OrderedPairs>) -> Self {
        let list = KeyValueList::from_pairs(initial);
        let autosave = Debouncer::new(window, tx);
        autosave.seed(&list.effective());
        Self { list, autosave }
    }

    /// Uses the `[autosave] debounce` window from the loaded config.
    pub fn with_config(initial: &[KeyValue], config: &AutosaveConfig, tx: UnboundedSender<OrderedPairs>) -> Self {
        Self::new(initial, config.debounce, tx)
    }

    pub fn window(&self) -> Duration {
        self.autosave.window()
    }

    pub fn list(&self) -> &KeyValueList {
        &self.list
    }

    pub fn effective(&self) -> OrderedPairs {
        self.list.effective()
    }

    pub fn append(&mut self, item: KeyValueItem) {
        self.list.append(item);
        self.changed();
    }

    pub fn remove(&mut self, index: usize) -> bool {
        self.list.remove(index) && self.changed()
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        self.list.toggle(index) && self.changed()
    }

    pub fn set_key(&mut self, index: usize, key: impl Into<String>) -> bool {
        self.list.set_key(index, key) && self.changed()
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<String>) -> bool {
        self.list.set_value(index, value) && self.changed()
    }

    /// Send any pending edit without waiting for the window.
    pub fn flush(&mut self) -> bool {
        self.autosave.flush()
    }

    fn changed(&mut self) -> bool {
        self.autosave.push(self.list.effective());
        true
    }
}
