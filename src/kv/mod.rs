// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The key-value store seam. Deduplication, shared state and the whitelist
//! all go through [KeyValueStore]; the redis client is one implementation,
//! the in-memory store backs tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::KvError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

mod memory;
mod redis_store;

/// Bound applied to every store call; a hung store must not wedge the
/// delivery task past this deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// The store operations the gateway needs. Keys are namespaced
/// `cacophony.*` by the callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    /// Set-if-absent without expiry. Returns true when this call created
    /// the key.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError>;
    /// Atomic set-if-absent with expiry; the dedup claim primitive.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;
    async fn del(&self, key: &str) -> Result<(), KvError>;
}
