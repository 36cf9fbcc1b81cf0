// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{KeyValueStore, DEFAULT_CALL_TIMEOUT};
use crate::errors::KvError;

/// Redis-backed [KeyValueStore]. The connection manager reconnects on its
/// own; individual calls are bounded by [DEFAULT_CALL_TIMEOUT].
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    call_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(address: &str, password: &str) -> Result<RedisStore, KvError> {
        let url = if password.is_empty() {
            format!("redis://{address}/")
        } else {
            format!("redis://:{password}@{address}/")
        };

        let client =
            redis::Client::open(url).map_err(|err| KvError::Connection(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| KvError::Connection(err.to_string()))?;

        Ok(RedisStore {
            manager,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, KvError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| KvError::Timeout(self.call_timeout))?
            .map_err(|err| KvError::Operation(err.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.set(key, value).await }).await
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.set_nx(key, value).await })
            .await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        // SET key value NX EX <seconds>; nil reply means the key was taken.
        let reply: Option<String> = self
            .bounded(async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(seconds)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.del(key).await }).await
    }
}
