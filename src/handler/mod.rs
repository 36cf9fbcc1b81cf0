// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The core pipeline: normalize, snapshot, admit, deduplicate, apply state,
//! diff, publish.
//!
//! State application always happens, even for duplicates and bookkeeping
//! variants; publication alone is gated by admission and deduplication.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn, Instrument};

use crate::dedup::Deduplicator;
use crate::errors::PublishError;
use crate::errortrack::ErrorSink;
use crate::event::{normalize, Event, EventKind, EventPayload};
use crate::metrics::EventCounters;
use crate::observe;
use crate::publisher::Publisher;
use crate::state::SharedState;
use crate::types::{Channel, DispatchEvent, Emoji, Guild, GuildMember, Invite, RoleObject, Webhook};
use crate::whitelist::Checker;

pub use members::MemberBackfill;

mod diff;
mod members;

/// Handles platform events and puts them onto the broker.
pub struct EventHandler {
    state: SharedState,
    checker: Checker,
    dedup: Deduplicator,
    publisher: Arc<dyn Publisher>,
    counters: Arc<EventCounters>,
    errors: Arc<dyn ErrorSink>,
    deduplicate: bool,
    /// Broker per-message expiration; unrelated to the dedup TTL.
    event_ttl: Duration,
    invites_diff: bool,
}

/// Pre-event reads of the objects a mutation is about to touch; re-read
/// after state application to synthesize the diff event.
enum Snapshot {
    Guild(Option<Guild>),
    Member {
        guild_id: String,
        user_id: String,
        member: Option<GuildMember>,
    },
    Channel(Option<Channel>),
    Role {
        guild_id: String,
        role_id: String,
        role: Option<RoleObject>,
    },
    Emojis {
        guild_id: String,
        emojis: Option<Vec<Emoji>>,
    },
    Webhooks {
        guild_id: String,
        webhooks: Vec<Webhook>,
    },
    Invites {
        guild_id: String,
        invites: Vec<Invite>,
    },
}

impl EventHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedState,
        checker: Checker,
        dedup: Deduplicator,
        publisher: Arc<dyn Publisher>,
        counters: Arc<EventCounters>,
        errors: Arc<dyn ErrorSink>,
        deduplicate: bool,
        event_ttl: Duration,
    ) -> EventHandler {
        EventHandler {
            state,
            checker,
            dedup,
            publisher,
            counters,
            errors,
            deduplicate,
            event_ttl,
            invites_diff: cfg!(feature = "invites-diff"),
        }
    }

    /// Receives one platform event from a session. An `Err` is fatal: the
    /// broker channel is gone and the replica must terminate.
    pub async fn on_platform_event(
        &self,
        bot_user_id: Option<&str>,
        dispatch: &DispatchEvent,
    ) -> Result<(), PublishError> {
        // The session has not identified yet; nothing to attribute this to.
        let Some(bot_user_id) = bot_user_id else {
            return Ok(());
        };

        let Some(mut event) = normalize(bot_user_id, dispatch) else {
            // Bookkeeping variants still populate the cache.
            self.counters.increment_discarded();
            self.apply_state(bot_user_id, dispatch).await;
            return Ok(());
        };

        event.span_context = Some(observe::new_carrier());
        let span = observe::event_span(&event);
        self.process(bot_user_id, dispatch, event).instrument(span).await
    }

    async fn process(
        &self,
        bot_user_id: &str,
        dispatch: &DispatchEvent,
        event: Event,
    ) -> Result<(), PublishError> {
        if let Some(guild_id) = &event.guild_id {
            if self.checker.is_denied(guild_id) {
                debug!(
                    kind = event.kind.as_str(),
                    guild_id = %guild_id,
                    "skipping event because guild is blacklisted"
                );
                return Ok(());
            }
        }

        self.counters.increment(event.kind);

        let pre = self.snapshot(&event).await;

        if self.deduplicate {
            match self.dedup.claim(&event.cache_key, event.ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(id = %event.id, "skipping event, as it is a duplicate");
                    // Another replica publishes; our cache still needs it.
                    self.apply_state(bot_user_id, dispatch).await;
                    return Ok(());
                }
                Err(err) => {
                    // Fail open: a store outage must not drop events.
                    warn!(error = %err, "unable to deduplicate event, processing it anyway");
                    self.errors.capture(&err);
                }
            }
        }

        self.apply_state(bot_user_id, dispatch).await;

        if let Some(guild_id) = &event.guild_id {
            if !self.checker.is_allowed(guild_id) {
                // State is global, publication is filtered.
                debug!(
                    kind = event.kind.as_str(),
                    guild_id = %guild_id,
                    "skipping event because guild is not whitelisted"
                );
                return Ok(());
            }
        }

        let diff_event = match pre {
            Some(pre) => self.diff_event(&event, pre).await,
            None => None,
        };

        self.publish(&event).await?;
        if let Some(diff_event) = diff_event {
            self.publish(&diff_event).await?;
        }

        Ok(())
    }

    async fn apply_state(&self, bot_user_id: &str, dispatch: &DispatchEvent) {
        if let Err(err) = self.state.apply(bot_user_id, dispatch).await {
            // Recoverable drift: the next guild-create style sync repairs it.
            error!(error = %err, "state client failed to handle event");
            self.errors.capture(&err);
        }
    }

    async fn snapshot(&self, event: &Event) -> Option<Snapshot> {
        let guild_id = event.guild_id.clone();

        let snapshot = match event.kind {
            EventKind::GuildUpdate => Snapshot::Guild(self.read_guild(&guild_id?).await),
            EventKind::GuildMemberUpdate => {
                let guild_id = guild_id?;
                let user_id = event.user_id.clone()?;
                let member = self
                    .state
                    .member(&guild_id, &user_id)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "unable to snapshot member");
                        None
                    });
                Snapshot::Member {
                    guild_id,
                    user_id,
                    member,
                }
            }
            EventKind::ChannelUpdate | EventKind::ChannelDelete => {
                let channel_id = event.channel_id.clone()?;
                let channel = self.state.channel(&channel_id).await.unwrap_or_else(|err| {
                    warn!(error = %err, "unable to snapshot channel");
                    None
                });
                Snapshot::Channel(channel)
            }
            EventKind::GuildRoleUpdate | EventKind::GuildRoleDelete => {
                let guild_id = guild_id?;
                let role_id = match &event.payload {
                    EventPayload::GuildRoleUpdate(payload) => payload.role.id.clone(),
                    EventPayload::GuildRoleDelete(payload) => payload.role_id.clone(),
                    _ => return None,
                };
                let role = self
                    .state
                    .role(&guild_id, &role_id)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "unable to snapshot role");
                        None
                    });
                Snapshot::Role {
                    guild_id,
                    role_id,
                    role,
                }
            }
            EventKind::GuildEmojisUpdate => {
                let guild_id = guild_id?;
                let emojis = self.read_guild(&guild_id).await.map(|guild| guild.emojis);
                Snapshot::Emojis { guild_id, emojis }
            }
            EventKind::WebhooksUpdate => {
                let guild_id = guild_id?;
                let webhooks = self
                    .state
                    .guild_webhooks(&guild_id)
                    .await
                    .unwrap_or_default();
                Snapshot::Webhooks { guild_id, webhooks }
            }
            EventKind::GuildMemberAdd if self.invites_diff => {
                let guild_id = guild_id?;
                let invites = self
                    .state
                    .guild_invites(&guild_id)
                    .await
                    .unwrap_or_default();
                Snapshot::Invites { guild_id, invites }
            }
            _ => return None,
        };

        Some(snapshot)
    }

    async fn diff_event(&self, event: &Event, pre: Snapshot) -> Option<Event> {
        let bot_user_id = &event.bot_user_id;

        let mut diff_event = match pre {
            Snapshot::Guild(old) => {
                let new = self.read_guild(event.guild_id.as_deref()?).await;
                diff::guild_diff(bot_user_id, old, new)?
            }
            Snapshot::Member {
                guild_id,
                user_id,
                member: old,
            } => {
                let new = self.state.member(&guild_id, &user_id).await.ok().flatten();
                diff::member_diff(bot_user_id, &guild_id, old, new)?
            }
            Snapshot::Channel(old) => {
                let channel_id = event.channel_id.as_deref()?;
                let new = self.state.channel(channel_id).await.ok().flatten();
                diff::channel_diff(bot_user_id, old, new)?
            }
            Snapshot::Role {
                guild_id,
                role_id,
                role: old,
            } => {
                let new = self.state.role(&guild_id, &role_id).await.ok().flatten();
                diff::role_diff(bot_user_id, &guild_id, old, new)?
            }
            Snapshot::Emojis {
                guild_id,
                emojis: old,
            } => {
                let new = self.read_guild(&guild_id).await.map(|guild| guild.emojis);
                diff::emoji_diff(bot_user_id, &guild_id, old, new)?
            }
            Snapshot::Webhooks {
                guild_id,
                webhooks: old,
            } => {
                let new = self
                    .state
                    .guild_webhooks(&guild_id)
                    .await
                    .unwrap_or_default();
                diff::webhooks_diff(bot_user_id, &guild_id, old, new)?
            }
            Snapshot::Invites {
                guild_id,
                invites: old,
            } => {
                let new = self
                    .state
                    .guild_invites(&guild_id)
                    .await
                    .unwrap_or_default();
                diff::invites_diff(bot_user_id, &guild_id, old, new)?
            }
        };

        diff_event.span_context = event.span_context.clone();
        Some(diff_event)
    }

    async fn read_guild(&self, guild_id: &str) -> Option<Guild> {
        self.state.guild(guild_id).await.unwrap_or_else(|err| {
            warn!(error = %err, "unable to snapshot guild");
            None
        })
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "unable to marshal event");
                self.errors.capture(&err);
                return Ok(());
            }
        };

        let routing_key = event.routing_key();
        match self
            .publisher
            .publish(&routing_key, body, self.event_ttl)
            .await
        {
            Ok(()) => {
                debug!(routing_key = %routing_key, id = %event.id, "published event");
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                error!(error = %err, routing_key = %routing_key, "broker channel is dead, terminating");
                self.errors.capture(&err);
                Err(err)
            }
            Err(err) => {
                error!(error = %err, routing_key = %routing_key, "unable to publish event");
                self.errors.capture(&err);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KeyValueStore, MemoryStore};
    use crate::publisher::MemoryPublisher;
    use crate::types::{GuildCreate, MessageCreate};

    struct Fixture {
        kv: Arc<MemoryStore>,
        publisher: Arc<MemoryPublisher>,
        handler: EventHandler,
    }

    async fn fixture(whitelist_enabled: bool, deduplicate: bool) -> Fixture {
        let kv: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let store: Arc<dyn KeyValueStore> = kv.clone();
        let publisher = Arc::new(MemoryPublisher::new());

        let checker = Checker::new(
            store.clone(),
            Duration::from_secs(60),
            whitelist_enabled,
        );
        checker.start().await.unwrap();

        let handler = EventHandler::new(
            SharedState::new(store.clone()),
            checker,
            Deduplicator::new(store),
            publisher.clone(),
            Arc::new(EventCounters::new()),
            Arc::new(crate::errortrack::LogSink),
            deduplicate,
            Duration::from_secs(600),
        );

        Fixture {
            kv,
            publisher,
            handler,
        }
    }

    fn message_create(guild_id: &str, id: &str) -> DispatchEvent {
        DispatchEvent::MessageCreate(MessageCreate {
            message: crate::types::Message {
                id: id.to_string(),
                channel_id: "C1".to_string(),
                guild_id: Some(guild_id.to_string()),
                content: "hi".to_string(),
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    async fn test_no_identity_drops_event() {
        let fixture = fixture(false, true).await;
        fixture
            .handler
            .on_platform_event(None, &message_create("100", "M1"))
            .await
            .unwrap();
        assert!(fixture.publisher.messages().is_empty());
        assert!(fixture.kv.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_still_applies_state() {
        let fixture = fixture(false, true).await;
        let dispatch = DispatchEvent::GuildCreate(GuildCreate {
            guild: Guild {
                id: "100".to_string(),
                name: Some("A".to_string()),
                ..Default::default()
            },
        });

        fixture
            .handler
            .on_platform_event(Some("B1"), &dispatch)
            .await
            .unwrap();
        fixture
            .handler
            .on_platform_event(Some("B2"), &dispatch)
            .await
            .unwrap();

        // One publish, but both replicas' state writes happened (owner is
        // still the first writer).
        assert_eq!(fixture.publisher.messages().len(), 1);
        let state = SharedState::new(fixture.kv.clone());
        assert_eq!(state.bot_for_guild("100").await.unwrap().unwrap(), "B1");
    }

    #[tokio::test]
    async fn test_dedup_fails_open_on_store_error() {
        let fixture = fixture(false, true).await;
        fixture.kv.set_failing(true);
        fixture
            .handler
            .on_platform_event(Some("B1"), &message_create("100", "M1"))
            .await
            .unwrap();
        assert_eq!(fixture.publisher.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_publish_error_bubbles() {
        let fixture = fixture(false, false).await;
        fixture.publisher.fail_next(PublishError::ChannelDead {
            reason: "gone".to_string(),
        });
        let result = fixture
            .handler
            .on_platform_event(Some("B1"), &message_create("100", "M1"))
            .await;
        assert!(matches!(result, Err(PublishError::ChannelDead { .. })));
    }

    #[tokio::test]
    async fn test_recoverable_publish_error_continues() {
        let fixture = fixture(false, false).await;
        fixture.publisher.fail_next(PublishError::Recoverable {
            routing_key: "cacophony.discord.message_create".to_string(),
            reason: "flow".to_string(),
        });
        fixture
            .handler
            .on_platform_event(Some("B1"), &message_create("100", "M1"))
            .await
            .unwrap();
        assert!(fixture.publisher.messages().is_empty());
    }
}
