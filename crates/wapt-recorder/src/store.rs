use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use wapt_common::error::StoreError;

const PROBE_KEY: &str = "wapt_probe";

/// Synchronous string-keyed store that survives page navigation.
///
/// All access happens on the page's main thread, so implementations use
/// interior mutability and take `&self`.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Drop every key owned by the recorder.
    fn clear(&self) -> Result<(), StoreError>;

    /// Feature detection: round-trip a probe key through the store.
    fn probe(&self) -> bool {
        if self.set(PROBE_KEY, PROBE_KEY).is_err() {
            return false;
        }
        let readable = matches!(self.get(PROBE_KEY), Ok(Some(v)) if v == PROBE_KEY);
        readable && self.remove(PROBE_KEY).is_ok()
    }
}

/// In-memory store used by tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    unavailable: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails, like a browser with storage disabled.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.set(true);
        store
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.get() {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.entries.borrow_mut().clear();
        Ok(())
    }
}
