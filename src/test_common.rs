#![cfg(test)]

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::legacy::{LegacyInfo, LegacySource};
use crate::store::{Store, StoreError};
use crate::user::User;

/// A user record whose `id` attribute is `id`.
pub fn user(id: i64) -> User {
    User::with_id(id).build()
}

/// A legacy source answering from a map and recording which features were asked for.
pub struct TestLegacySource {
    infos: HashMap<String, LegacyInfo>,
    reads: Arc<Mutex<Vec<String>>>,
}

impl TestLegacySource {
    pub fn new(infos: HashMap<String, LegacyInfo>) -> Self {
        Self {
            infos,
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reads(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.reads)
    }
}

impl LegacySource for TestLegacySource {
    fn info(&self, feature: &str) -> Result<LegacyInfo, StoreError> {
        self.reads.lock().push(feature.to_string());
        Ok(self.infos.get(feature).cloned().unwrap_or_default())
    }
}

/// A store whose every call fails the way a dropped connection would.
pub struct FailingStore;

fn refused() -> StoreError {
    Box::new(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

impl Store for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(refused())
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(refused())
    }

    fn del(&self, _key: &str) -> Result<(), StoreError> {
        Err(refused())
    }
}
