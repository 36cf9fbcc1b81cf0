// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The internal event model: the normalized record published to the broker,
//! and the normalizer turning platform dispatches into it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{
    Channel, DispatchEvent, Emoji, Guild, GuildMember, Invite, RoleObject, Webhook,
};
use crate::types::{
    ChannelCreate, ChannelDelete, ChannelPinsUpdate, ChannelUpdate, GuildBanAdd, GuildBanRemove,
    GuildCreate, GuildDelete, GuildEmojisUpdate, GuildMemberAdd, GuildMemberRemove,
    GuildMemberUpdate, GuildMembersChunk, GuildRoleCreate, GuildRoleDelete, GuildRoleUpdate,
    GuildUpdate, MessageCreate, MessageDelete, MessageReactionAdd, MessageReactionRemove,
    MessageReactionRemoveAll, MessageUpdate, PresenceUpdate, WebhooksUpdate,
};

/// Dedup horizon for every forwarded event type. This is not a freshness
/// bound: it only needs to exceed cross-replica delivery skew by a wide
/// margin.
pub const DEDUP_TTL: Duration = Duration::from_secs(15 * 60);

/// Closed set of event types the gateway publishes, primary and derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    GuildMembersChunk,
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,
    GuildEmojisUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    ChannelPinsUpdate,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    PresenceUpdate,
    GuildBanAdd,
    GuildBanRemove,
    MessageReactionAdd,
    MessageReactionRemove,
    MessageReactionRemoveAll,
    WebhooksUpdate,
    DiffGuild,
    DiffMember,
    DiffChannel,
    DiffRole,
    DiffEmoji,
    DiffWebhooks,
    DiffInvites,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GuildCreate => "guild_create",
            EventKind::GuildUpdate => "guild_update",
            EventKind::GuildDelete => "guild_delete",
            EventKind::GuildMemberAdd => "guild_member_add",
            EventKind::GuildMemberUpdate => "guild_member_update",
            EventKind::GuildMemberRemove => "guild_member_remove",
            EventKind::GuildMembersChunk => "guild_members_chunk",
            EventKind::GuildRoleCreate => "guild_role_create",
            EventKind::GuildRoleUpdate => "guild_role_update",
            EventKind::GuildRoleDelete => "guild_role_delete",
            EventKind::GuildEmojisUpdate => "guild_emojis_update",
            EventKind::ChannelCreate => "channel_create",
            EventKind::ChannelUpdate => "channel_update",
            EventKind::ChannelDelete => "channel_delete",
            EventKind::ChannelPinsUpdate => "channel_pins_update",
            EventKind::MessageCreate => "message_create",
            EventKind::MessageUpdate => "message_update",
            EventKind::MessageDelete => "message_delete",
            EventKind::PresenceUpdate => "presence_update",
            EventKind::GuildBanAdd => "guild_ban_add",
            EventKind::GuildBanRemove => "guild_ban_remove",
            EventKind::MessageReactionAdd => "message_reaction_add",
            EventKind::MessageReactionRemove => "message_reaction_remove",
            EventKind::MessageReactionRemoveAll => "message_reaction_remove_all",
            EventKind::WebhooksUpdate => "webhooks_update",
            EventKind::DiffGuild => "diff_guild",
            EventKind::DiffMember => "diff_member",
            EventKind::DiffChannel => "diff_channel",
            EventKind::DiffRole => "diff_role",
            EventKind::DiffEmoji => "diff_emoji",
            EventKind::DiffWebhooks => "diff_webhooks",
            EventKind::DiffInvites => "diff_invites",
        }
    }

    /// The broker topic this event type publishes on.
    pub fn routing_key(&self) -> String {
        format!("cacophony.discord.{}", self.as_str())
    }
}

/// An `{old, new}` pair around a mutation where both sides exist.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Diff<T> {
    pub old: T,
    pub new: T,
}

/// An `{old, new}` pair where the new side may be gone (deletes).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeleteDiff<T> {
    pub old: T,
    pub new: Option<T>,
}

/// Invite list diff plus the invite whose use count incremented by exactly
/// one, when a single such candidate exists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvitesDiff {
    pub old: Vec<Invite>,
    pub new: Vec<Invite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<Invite>,
}

/// The typed payload slot of an [Event]; one variant per event type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EventPayload {
    #[serde(rename = "guild_create")]
    GuildCreate(GuildCreate),
    #[serde(rename = "guild_update")]
    GuildUpdate(GuildUpdate),
    #[serde(rename = "guild_delete")]
    GuildDelete(GuildDelete),
    #[serde(rename = "guild_member_add")]
    GuildMemberAdd(GuildMemberAdd),
    #[serde(rename = "guild_member_update")]
    GuildMemberUpdate(GuildMemberUpdate),
    #[serde(rename = "guild_member_remove")]
    GuildMemberRemove(GuildMemberRemove),
    #[serde(rename = "guild_members_chunk")]
    GuildMembersChunk(GuildMembersChunk),
    #[serde(rename = "guild_role_create")]
    GuildRoleCreate(GuildRoleCreate),
    #[serde(rename = "guild_role_update")]
    GuildRoleUpdate(GuildRoleUpdate),
    #[serde(rename = "guild_role_delete")]
    GuildRoleDelete(GuildRoleDelete),
    #[serde(rename = "guild_emojis_update")]
    GuildEmojisUpdate(GuildEmojisUpdate),
    #[serde(rename = "channel_create")]
    ChannelCreate(ChannelCreate),
    #[serde(rename = "channel_update")]
    ChannelUpdate(ChannelUpdate),
    #[serde(rename = "channel_delete")]
    ChannelDelete(ChannelDelete),
    #[serde(rename = "channel_pins_update")]
    ChannelPinsUpdate(ChannelPinsUpdate),
    #[serde(rename = "message_create")]
    MessageCreate(MessageCreate),
    #[serde(rename = "message_update")]
    MessageUpdate(MessageUpdate),
    #[serde(rename = "message_delete")]
    MessageDelete(MessageDelete),
    #[serde(rename = "presence_update")]
    PresenceUpdate(PresenceUpdate),
    #[serde(rename = "guild_ban_add")]
    GuildBanAdd(GuildBanAdd),
    #[serde(rename = "guild_ban_remove")]
    GuildBanRemove(GuildBanRemove),
    #[serde(rename = "message_reaction_add")]
    MessageReactionAdd(MessageReactionAdd),
    #[serde(rename = "message_reaction_remove")]
    MessageReactionRemove(MessageReactionRemove),
    #[serde(rename = "message_reaction_remove_all")]
    MessageReactionRemoveAll(MessageReactionRemoveAll),
    #[serde(rename = "webhooks_update")]
    WebhooksUpdate(WebhooksUpdate),
    #[serde(rename = "diff_guild")]
    DiffGuild(Diff<Guild>),
    #[serde(rename = "diff_member")]
    DiffMember(Diff<GuildMember>),
    #[serde(rename = "diff_channel")]
    DiffChannel(DeleteDiff<Channel>),
    #[serde(rename = "diff_role")]
    DiffRole(DeleteDiff<RoleObject>),
    #[serde(rename = "diff_emoji")]
    DiffEmoji(Diff<Vec<Emoji>>),
    #[serde(rename = "diff_webhooks")]
    DiffWebhooks(Diff<Vec<Webhook>>),
    #[serde(rename = "diff_invites")]
    DiffInvites(InvitesDiff),
}

/// A normalized event, immutable once built.
///
/// `cache_key` is the deterministic fingerprint the deduplicator claims;
/// two replicas observing the same logical occurrence compute the same key.
/// `span_context` is an opaque text-map carrier of trace headers; its format
/// belongs to the consumer's propagator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "botUserId")]
    pub bot_user_id: String,
    #[serde(rename = "guildId", skip_serializing_if = "Option::is_none", default)]
    pub guild_id: Option<String>,
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none", default)]
    pub channel_id: Option<String>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none", default)]
    pub message_id: Option<String>,
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
    #[serde(rename = "cacheKey", skip_serializing_if = "String::is_empty", default)]
    pub cache_key: String,
    #[serde(
        rename = "spanContext",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub span_context: Option<HashMap<String, String>>,
    /// Recommended dedup window; not part of the published body.
    #[serde(skip)]
    pub ttl: Duration,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// A fresh event of the given type; correlation ids and cache key start
    /// empty and are filled by the normalizer (or diff synthesis).
    pub fn new(kind: EventKind, bot_user_id: &str, payload: EventPayload) -> Event {
        Event {
            id: Uuid::new_v4().to_string(),
            kind,
            bot_user_id: bot_user_id.to_string(),
            guild_id: None,
            channel_id: None,
            user_id: None,
            message_id: None,
            received_at: Utc::now(),
            cache_key: String::new(),
            span_context: None,
            ttl: Duration::ZERO,
            payload,
        }
    }

    pub fn routing_key(&self) -> String {
        self.kind.routing_key()
    }
}

/// Builds the replica-stable cache key `gw:<type>:<hash>` from the payload
/// fields that identify one logical occurrence.
fn cache_key<T: Serialize>(kind: EventKind, fingerprint: &T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(serde_json::to_vec(fingerprint).unwrap_or_default());
    let digest = hasher.finalize();
    format!("gw:{}:{}", kind.as_str(), hex::encode(&digest[..16]))
}

/// Maps a platform dispatch to a normalized [Event].
///
/// Returns `None` for session bookkeeping we do not forward (ready,
/// resumed); the caller still applies those to shared state.
pub fn normalize(bot_user_id: &str, dispatch: &DispatchEvent) -> Option<Event> {
    let mut event = match dispatch {
        DispatchEvent::Ready(_) | DispatchEvent::Resumed => return None,
        DispatchEvent::GuildCreate(e) => {
            let mut event = Event::new(
                EventKind::GuildCreate,
                bot_user_id,
                EventPayload::GuildCreate(e.clone()),
            );
            event.guild_id = Some(e.guild.id.clone());
            event.cache_key = cache_key(event.kind, &e.guild);
            event
        }
        DispatchEvent::GuildUpdate(e) => {
            let mut event = Event::new(
                EventKind::GuildUpdate,
                bot_user_id,
                EventPayload::GuildUpdate(e.clone()),
            );
            event.guild_id = Some(e.guild.id.clone());
            event.cache_key = cache_key(event.kind, &e.guild);
            event
        }
        DispatchEvent::GuildDelete(e) => {
            let mut event = Event::new(
                EventKind::GuildDelete,
                bot_user_id,
                EventPayload::GuildDelete(e.clone()),
            );
            event.guild_id = Some(e.guild.id.clone());
            event.cache_key = cache_key(event.kind, &e.guild);
            event
        }
        DispatchEvent::GuildMemberAdd(e) => {
            let mut event = Event::new(
                EventKind::GuildMemberAdd,
                bot_user_id,
                EventPayload::GuildMemberAdd(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.user_id = e.member.user.as_ref().map(|user| user.id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.member));
            event
        }
        DispatchEvent::GuildMemberUpdate(e) => {
            let mut event = Event::new(
                EventKind::GuildMemberUpdate,
                bot_user_id,
                EventPayload::GuildMemberUpdate(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.user_id = e.member.user.as_ref().map(|user| user.id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.member));
            event
        }
        DispatchEvent::GuildMemberRemove(e) => {
            let mut event = Event::new(
                EventKind::GuildMemberRemove,
                bot_user_id,
                EventPayload::GuildMemberRemove(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.user_id = Some(e.user.id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.user));
            event
        }
        DispatchEvent::GuildMembersChunk(e) => {
            let mut event = Event::new(
                EventKind::GuildMembersChunk,
                bot_user_id,
                EventPayload::GuildMembersChunk(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.members));
            event
        }
        DispatchEvent::GuildRoleCreate(e) => {
            let mut event = Event::new(
                EventKind::GuildRoleCreate,
                bot_user_id,
                EventPayload::GuildRoleCreate(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.role));
            event
        }
        DispatchEvent::GuildRoleUpdate(e) => {
            let mut event = Event::new(
                EventKind::GuildRoleUpdate,
                bot_user_id,
                EventPayload::GuildRoleUpdate(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.role));
            event
        }
        DispatchEvent::GuildRoleDelete(e) => {
            let mut event = Event::new(
                EventKind::GuildRoleDelete,
                bot_user_id,
                EventPayload::GuildRoleDelete(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.role_id, &e.guild_id));
            event
        }
        DispatchEvent::GuildEmojisUpdate(e) => {
            let mut event = Event::new(
                EventKind::GuildEmojisUpdate,
                bot_user_id,
                EventPayload::GuildEmojisUpdate(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.guild_id, &e.emojis));
            event
        }
        DispatchEvent::ChannelCreate(e) => {
            let mut event = Event::new(
                EventKind::ChannelCreate,
                bot_user_id,
                EventPayload::ChannelCreate(e.clone()),
            );
            event.guild_id = e.channel.guild_id.clone();
            event.channel_id = Some(e.channel.id.clone());
            event.cache_key = cache_key(event.kind, &e.channel);
            event
        }
        DispatchEvent::ChannelUpdate(e) => {
            let mut event = Event::new(
                EventKind::ChannelUpdate,
                bot_user_id,
                EventPayload::ChannelUpdate(e.clone()),
            );
            event.guild_id = e.channel.guild_id.clone();
            event.channel_id = Some(e.channel.id.clone());
            event.cache_key = cache_key(event.kind, &e.channel);
            event
        }
        DispatchEvent::ChannelDelete(e) => {
            let mut event = Event::new(
                EventKind::ChannelDelete,
                bot_user_id,
                EventPayload::ChannelDelete(e.clone()),
            );
            event.guild_id = e.channel.guild_id.clone();
            event.channel_id = Some(e.channel.id.clone());
            event.cache_key = cache_key(event.kind, &e.channel);
            event
        }
        DispatchEvent::ChannelPinsUpdate(e) => {
            let mut event = Event::new(
                EventKind::ChannelPinsUpdate,
                bot_user_id,
                EventPayload::ChannelPinsUpdate(e.clone()),
            );
            event.guild_id = e.guild_id.clone();
            event.channel_id = Some(e.channel_id.clone());
            event.cache_key = cache_key(event.kind, &(&e.channel_id, &e.last_pin_timestamp));
            event
        }
        DispatchEvent::MessageCreate(e) => {
            let mut event = Event::new(
                EventKind::MessageCreate,
                bot_user_id,
                EventPayload::MessageCreate(e.clone()),
            );
            event.guild_id = e.message.guild_id.clone();
            event.channel_id = Some(e.message.channel_id.clone());
            event.message_id = Some(e.message.id.clone());
            event.user_id = e.message.author.as_ref().map(|user| user.id.clone());
            event.cache_key = cache_key(event.kind, &e.message);
            event
        }
        DispatchEvent::MessageUpdate(e) => {
            let mut event = Event::new(
                EventKind::MessageUpdate,
                bot_user_id,
                EventPayload::MessageUpdate(e.clone()),
            );
            event.guild_id = e.message.guild_id.clone();
            event.channel_id = Some(e.message.channel_id.clone());
            event.message_id = Some(e.message.id.clone());
            event.user_id = e.message.author.as_ref().map(|user| user.id.clone());
            event.cache_key = cache_key(event.kind, &e.message);
            event
        }
        DispatchEvent::MessageDelete(e) => {
            let mut event = Event::new(
                EventKind::MessageDelete,
                bot_user_id,
                EventPayload::MessageDelete(e.clone()),
            );
            event.guild_id = e.guild_id.clone();
            event.channel_id = Some(e.channel_id.clone());
            event.message_id = Some(e.id.clone());
            event.cache_key = cache_key(event.kind, e);
            event
        }
        DispatchEvent::PresenceUpdate(e) => {
            let mut event = Event::new(
                EventKind::PresenceUpdate,
                bot_user_id,
                EventPayload::PresenceUpdate(e.clone()),
            );
            event.guild_id = e.guild_id.clone();
            event.user_id = Some(e.user.id.clone());
            event.cache_key = cache_key(event.kind, e);
            event
        }
        DispatchEvent::GuildBanAdd(e) => {
            let mut event = Event::new(
                EventKind::GuildBanAdd,
                bot_user_id,
                EventPayload::GuildBanAdd(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.user_id = Some(e.user.id.clone());
            event.cache_key = cache_key(event.kind, &(&e.user, &e.guild_id));
            event
        }
        DispatchEvent::GuildBanRemove(e) => {
            let mut event = Event::new(
                EventKind::GuildBanRemove,
                bot_user_id,
                EventPayload::GuildBanRemove(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.user_id = Some(e.user.id.clone());
            event.cache_key = cache_key(event.kind, &(&e.user, &e.guild_id));
            event
        }
        DispatchEvent::MessageReactionAdd(e) => {
            let mut event = Event::new(
                EventKind::MessageReactionAdd,
                bot_user_id,
                EventPayload::MessageReactionAdd(e.clone()),
            );
            event.guild_id = e.reaction.guild_id.clone();
            event.channel_id = Some(e.reaction.channel_id.clone());
            event.message_id = Some(e.reaction.message_id.clone());
            event.user_id = Some(e.reaction.user_id.clone());
            event.cache_key = cache_key(event.kind, &e.reaction);
            event
        }
        DispatchEvent::MessageReactionRemove(e) => {
            let mut event = Event::new(
                EventKind::MessageReactionRemove,
                bot_user_id,
                EventPayload::MessageReactionRemove(e.clone()),
            );
            event.guild_id = e.reaction.guild_id.clone();
            event.channel_id = Some(e.reaction.channel_id.clone());
            event.message_id = Some(e.reaction.message_id.clone());
            event.user_id = Some(e.reaction.user_id.clone());
            event.cache_key = cache_key(event.kind, &e.reaction);
            event
        }
        DispatchEvent::MessageReactionRemoveAll(e) => {
            let mut event = Event::new(
                EventKind::MessageReactionRemoveAll,
                bot_user_id,
                EventPayload::MessageReactionRemoveAll(e.clone()),
            );
            event.guild_id = e.guild_id.clone();
            event.channel_id = Some(e.channel_id.clone());
            event.message_id = Some(e.message_id.clone());
            event.cache_key = cache_key(event.kind, e);
            event
        }
        DispatchEvent::WebhooksUpdate(e) => {
            let mut event = Event::new(
                EventKind::WebhooksUpdate,
                bot_user_id,
                EventPayload::WebhooksUpdate(e.clone()),
            );
            event.guild_id = Some(e.guild_id.clone());
            event.channel_id = Some(e.channel_id.clone());
            event.cache_key = cache_key(event.kind, e);
            event
        }
    };

    event.ttl = DEDUP_TTL;
    Some(event)
}
