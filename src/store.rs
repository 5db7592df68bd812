use std::collections::HashMap;

use parking_lot::RwLock;

/// Error produced by a [Store] backend. It is handed back to the caller unchanged, wrapped in
/// [crate::Error::Store].
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Store is an interface for the key-value store that holds serialized features and the feature
/// index.
///
/// Every call is expected to be atomic and immediately visible to later calls, but nothing is
/// expected to be atomic across calls.
pub trait Store {
    /// Retrieve the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing whatever was there.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Retrieve the values stored under each of `keys`, in order.
    ///
    /// Backends with a native multi-get should override this.
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Whether anything is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: Store + ?Sized> Store for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        (**self).del(key)
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        (**self).mget(keys)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }
}

/// An in-process [Store] backed by a hash map, for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let data = self.data.read();
        Ok(keys.iter().map(|key| data.get(key).cloned()).collect())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(key))
    }
}
