// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-replica deduplication: one atomic set-if-absent per event.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::DedupError;
use crate::kv::KeyValueStore;

/// Claims cache keys in the shared store. The replica whose claim created
/// the key owns the event and must process it to publication.
pub struct Deduplicator {
    kv: Arc<dyn KeyValueStore>,
}

impl Deduplicator {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Deduplicator {
        Deduplicator { kv }
    }

    /// Returns true when this replica is the first to observe the event
    /// within the TTL window. Store errors are returned; the caller decides
    /// between fail-open and fail-closed.
    pub async fn claim(&self, cache_key: &str, ttl: Duration) -> Result<bool, DedupError> {
        if cache_key.is_empty() {
            return Err(DedupError::EmptyKey);
        }

        let fresh = self.kv.set_nx_ex(cache_key, "1", ttl).await?;
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[tokio::test]
    async fn test_first_claim_is_fresh() {
        let kv = Arc::new(MemoryStore::new());
        let dedup = Deduplicator::new(kv);
        let ttl = Duration::from_secs(900);

        assert!(dedup.claim("gw:message_create:abc", ttl).await.unwrap());
        assert!(!dedup.claim("gw:message_create:abc", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_two_replicas_share_one_claim() {
        let kv = Arc::new(MemoryStore::new());
        let replica_a = Deduplicator::new(kv.clone());
        let replica_b = Deduplicator::new(kv);
        let ttl = Duration::from_secs(900);

        let a = replica_a.claim("gw:message_create:m1", ttl).await.unwrap();
        let b = replica_b.claim("gw:message_create:m1", ttl).await.unwrap();
        assert!(a ^ b, "exactly one replica must win the claim");
    }

    #[tokio::test]
    async fn test_empty_key_is_an_error() {
        let dedup = Deduplicator::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            dedup.claim("", Duration::from_secs(1)).await,
            Err(DedupError::EmptyKey)
        ));
    }
}
