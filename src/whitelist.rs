// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Whitelist/blacklist admission. Each replica keeps a private snapshot of
//! both sets, rebuilt wholesale from the store on an interval.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, error};

use crate::errors::KvError;
use crate::kv::KeyValueStore;

const WHITELIST_KEY: &str = "cacophony.whitelist.whitelist";
const BLACKLIST_KEY: &str = "cacophony.whitelist.blacklist";

/// Answers admission queries from in-process snapshots. Cheap to clone;
/// clones share the same snapshots.
#[derive(Clone)]
pub struct Checker {
    inner: Arc<Inner>,
}

struct Inner {
    kv: Arc<dyn KeyValueStore>,
    interval: Duration,
    enable: bool,
    whitelist: RwLock<Snapshot>,
    blacklist: RwLock<Snapshot>,
}

#[derive(Default)]
struct Snapshot {
    set: HashSet<String>,
    list: Vec<String>,
}

impl Checker {
    pub fn new(kv: Arc<dyn KeyValueStore>, interval: Duration, enable: bool) -> Checker {
        Checker {
            inner: Arc::new(Inner {
                kv,
                interval,
                enable,
                whitelist: RwLock::new(Snapshot::default()),
                blacklist: RwLock::new(Snapshot::default()),
            }),
        }
    }

    /// Fetches both sets once so queries are correct before the first tick,
    /// then launches the periodic refresh.
    pub async fn start(&self) -> Result<(), KvError> {
        let whitelist = fetch(self.inner.kv.as_ref(), WHITELIST_KEY).await?;
        *self.inner.whitelist.write().unwrap() = whitelist;

        let blacklist = fetch(self.inner.kv.as_ref(), BLACKLIST_KEY).await?;
        *self.inner.blacklist.write().unwrap() = blacklist;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match fetch(inner.kv.as_ref(), WHITELIST_KEY).await {
                    Ok(snapshot) => *inner.whitelist.write().unwrap() = snapshot,
                    Err(err) => error!(error = %err, "failed to retrieve whitelist"),
                }

                match fetch(inner.kv.as_ref(), BLACKLIST_KEY).await {
                    Ok(snapshot) => *inner.blacklist.write().unwrap() = snapshot,
                    Err(err) => error!(error = %err, "failed to retrieve blacklist"),
                }

                debug!("cached whitelist and blacklist");
            }
        });

        Ok(())
    }

    /// One refresh pass without the background task; test hook.
    pub async fn refresh_once(&self) {
        match fetch(self.inner.kv.as_ref(), WHITELIST_KEY).await {
            Ok(snapshot) => *self.inner.whitelist.write().unwrap() = snapshot,
            Err(err) => error!(error = %err, "failed to retrieve whitelist"),
        }
        match fetch(self.inner.kv.as_ref(), BLACKLIST_KEY).await {
            Ok(snapshot) => *self.inner.blacklist.write().unwrap() = snapshot,
            Err(err) => error!(error = %err, "failed to retrieve blacklist"),
        }
    }

    pub fn enabled(&self) -> bool {
        self.inner.enable
    }

    pub fn is_allowed(&self, guild_id: &str) -> bool {
        if !self.inner.enable {
            return true;
        }

        self.inner.whitelist.read().unwrap().set.contains(guild_id)
    }

    pub fn is_denied(&self, guild_id: &str) -> bool {
        if !self.inner.enable {
            return false;
        }

        self.inner.blacklist.read().unwrap().set.contains(guild_id)
    }

    /// The current allow-list, in store order.
    pub fn snapshot(&self) -> Vec<String> {
        if !self.inner.enable {
            return Vec::new();
        }

        self.inner.whitelist.read().unwrap().list.clone()
    }
}

/// Reads one `;`-delimited id list. A missing key is an empty set.
async fn fetch(kv: &dyn KeyValueStore, key: &str) -> Result<Snapshot, KvError> {
    let raw = kv.get(key).await?.unwrap_or_default();

    let list: Vec<String> = raw
        .split(';')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    let set = list.iter().cloned().collect();

    Ok(Snapshot { set, list })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    async fn seeded_store() -> Arc<MemoryStore> {
        let kv = Arc::new(MemoryStore::new());
        kv.set(WHITELIST_KEY, "100;300").await.unwrap();
        kv.set(BLACKLIST_KEY, "200").await.unwrap();
        kv
    }

    #[tokio::test]
    async fn test_queries_after_start() {
        let checker = Checker::new(seeded_store().await, Duration::from_secs(60), true);
        checker.start().await.unwrap();

        assert!(checker.is_allowed("100"));
        assert!(checker.is_allowed("300"));
        assert!(!checker.is_allowed("200"));
        assert!(checker.is_denied("200"));
        assert!(!checker.is_denied("100"));
        assert_eq!(checker.snapshot(), vec!["100", "300"]);
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let checker = Checker::new(seeded_store().await, Duration::from_secs(60), false);
        checker.start().await.unwrap();

        assert!(checker.is_allowed("200"));
        assert!(!checker.is_denied("200"));
        assert!(checker.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_last_known_good() {
        let kv = seeded_store().await;
        let checker = Checker::new(kv.clone(), Duration::from_secs(60), true);
        checker.start().await.unwrap();
        assert!(checker.is_allowed("300"));

        kv.set_failing(true);
        checker.refresh_once().await;
        assert!(checker.is_allowed("300"), "prior snapshot must survive a store error");

        kv.set_failing(false);
        kv.set(WHITELIST_KEY, "300").await.unwrap();
        checker.refresh_once().await;
        assert!(!checker.is_allowed("100"));
        assert!(checker.is_allowed("300"));
    }

    #[tokio::test]
    async fn test_missing_keys_are_empty_sets() {
        let checker = Checker::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
            true,
        );
        checker.start().await.unwrap();
        assert!(!checker.is_allowed("100"));
        assert!(!checker.is_denied("100"));
    }
}
