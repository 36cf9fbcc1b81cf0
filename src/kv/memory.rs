// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::KeyValueStore;
use crate::errors::KvError;

/// In-memory [KeyValueStore] with expiry, used by tests. One instance
/// shared between several components models the replica-shared store; the
/// failure switch injects store outages.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    failing: AtomicBool,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| !entry.expired());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time on a key, if it has one.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.expired() {
            return None;
        }
        entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn check_failing(&self) -> Result<(), KvError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KvError::Operation("injected store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.check_failing()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.check_failing()?;
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError> {
        self.check_failing()?;
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        self.check_failing()?;
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.check_failing()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_nx_ex_claims_once() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.set_nx_ex("k", "1", ttl).await.unwrap());
        assert!(!store.set_nx_ex("k", "1", ttl).await.unwrap());
        assert!(store.ttl_of("k").unwrap() <= ttl);
    }

    #[tokio::test]
    async fn test_expired_keys_can_be_reclaimed() {
        let store = MemoryStore::new();
        assert!(store.set_nx_ex("k", "1", Duration::ZERO).await.unwrap());
        assert!(store.set_nx_ex("k", "1", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.get("k").await.is_err());
        store.set_failing(false);
        assert!(store.get("k").await.unwrap().is_none());
    }
}
