// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared test harness: one replica = handler + doubles wired to a store
//! that can be shared between replicas.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cacophony_gateway::dedup::Deduplicator;
use cacophony_gateway::errors::SessionError;
use cacophony_gateway::errortrack::LogSink;
use cacophony_gateway::handler::EventHandler;
use cacophony_gateway::kv::{KeyValueStore, MemoryStore};
use cacophony_gateway::metrics::EventCounters;
use cacophony_gateway::publisher::MemoryPublisher;
use cacophony_gateway::session::PlatformConnection;
use cacophony_gateway::state::SharedState;
use cacophony_gateway::types::{
    DispatchEvent, Guild, GuildCreate, GuildUpdate, Message, MessageCreate, User,
};
use cacophony_gateway::whitelist::Checker;

#[allow(dead_code)]
pub const WHITELIST_KEY: &str = "cacophony.whitelist.whitelist";
#[allow(dead_code)]
pub const BLACKLIST_KEY: &str = "cacophony.whitelist.blacklist";

#[allow(dead_code)]
pub struct TestReplica {
    pub kv: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub state: SharedState,
    pub checker: Checker,
    pub counters: Arc<EventCounters>,
    pub handler: Arc<EventHandler>,
}

/// One replica over a fresh store.
#[allow(dead_code)]
pub async fn setup(whitelist_enabled: bool, deduplicate: bool) -> TestReplica {
    replica(Arc::new(MemoryStore::new()), whitelist_enabled, deduplicate).await
}

/// One replica over a shared store; call twice with the same store to model
/// horizontal scaling.
pub async fn replica(
    kv: Arc<MemoryStore>,
    whitelist_enabled: bool,
    deduplicate: bool,
) -> TestReplica {
    let store: Arc<dyn KeyValueStore> = kv.clone();
    let publisher = Arc::new(MemoryPublisher::new());
    let counters = Arc::new(EventCounters::new());

    let checker = Checker::new(store.clone(), Duration::from_secs(60), whitelist_enabled);
    checker
        .start()
        .await
        .expect("whitelist checker failed to start");

    let state = SharedState::new(store.clone());
    let handler = Arc::new(EventHandler::new(
        state.clone(),
        checker.clone(),
        Deduplicator::new(store),
        publisher.clone(),
        counters.clone(),
        Arc::new(LogSink),
        deduplicate,
        Duration::from_secs(600),
    ));

    TestReplica {
        kv,
        publisher,
        state,
        checker,
        counters,
        handler,
    }
}

pub fn guild_create(guild_id: &str, name: &str) -> DispatchEvent {
    DispatchEvent::GuildCreate(GuildCreate {
        guild: Guild {
            id: guild_id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        },
    })
}

#[allow(dead_code)]
pub fn guild_update(guild_id: &str, name: &str) -> DispatchEvent {
    DispatchEvent::GuildUpdate(GuildUpdate {
        guild: Guild {
            id: guild_id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        },
    })
}

#[allow(dead_code)]
pub fn message_create(guild_id: Option<&str>, message_id: &str, content: &str) -> DispatchEvent {
    DispatchEvent::MessageCreate(MessageCreate {
        message: Message {
            id: message_id.to_string(),
            channel_id: "C1".to_string(),
            guild_id: guild_id.map(str::to_string),
            author: Some(User {
                id: "U1".to_string(),
                username: "someone".to_string(),
                ..Default::default()
            }),
            content: content.to_string(),
            ..Default::default()
        },
    })
}

/// Session double recording every member request.
#[derive(Default)]
pub struct RecordingConnection {
    requests: Mutex<Vec<Vec<String>>>,
    closed: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingConnection {
    pub fn new() -> RecordingConnection {
        RecordingConnection::default()
    }

    pub fn requested_guilds(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl PlatformConnection for RecordingConnection {
    async fn request_members(
        &self,
        guild_id: &str,
        _query: &str,
        _limit: u32,
    ) -> Result<(), SessionError> {
        self.requests
            .lock()
            .unwrap()
            .push(vec![guild_id.to_string()]);
        Ok(())
    }

    async fn request_members_batch(&self, guild_ids: &[String]) -> Result<(), SessionError> {
        self.requests.lock().unwrap().push(guild_ids.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
