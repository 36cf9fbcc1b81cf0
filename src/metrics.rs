// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory event counters, exposed on the status surface.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::event::EventKind;

/// One counter per forwarded event type, plus the events we discarded
/// (bookkeeping variants and unknown dispatches).
#[derive(Debug, Default)]
pub struct EventCounters {
    discarded: AtomicU64,
    guild_create: AtomicU64,
    guild_update: AtomicU64,
    guild_delete: AtomicU64,
    guild_member_add: AtomicU64,
    guild_member_update: AtomicU64,
    guild_member_remove: AtomicU64,
    guild_members_chunk: AtomicU64,
    guild_role_create: AtomicU64,
    guild_role_update: AtomicU64,
    guild_role_delete: AtomicU64,
    guild_emojis_update: AtomicU64,
    channel_create: AtomicU64,
    channel_update: AtomicU64,
    channel_delete: AtomicU64,
    channel_pins_update: AtomicU64,
    message_create: AtomicU64,
    message_update: AtomicU64,
    message_delete: AtomicU64,
    presence_update: AtomicU64,
    guild_ban_add: AtomicU64,
    guild_ban_remove: AtomicU64,
    reaction_add: AtomicU64,
    reaction_remove: AtomicU64,
    reaction_remove_all: AtomicU64,
    webhooks_update: AtomicU64,
}

/// Point-in-time copy of [EventCounters], serialized into `/stats`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct EventCountersSnapshot {
    pub discarded: u64,
    pub guild_create: u64,
    pub guild_update: u64,
    pub guild_delete: u64,
    pub guild_member_add: u64,
    pub guild_member_update: u64,
    pub guild_member_remove: u64,
    pub guild_members_chunk: u64,
    pub guild_role_create: u64,
    pub guild_role_update: u64,
    pub guild_role_delete: u64,
    pub guild_emojis_update: u64,
    pub channel_create: u64,
    pub channel_update: u64,
    pub channel_delete: u64,
    pub channel_pins_update: u64,
    pub message_create: u64,
    pub message_update: u64,
    pub message_delete: u64,
    pub presence_update: u64,
    pub guild_ban_add: u64,
    pub guild_ban_remove: u64,
    pub reaction_add: u64,
    pub reaction_remove: u64,
    pub reaction_remove_all: u64,
    pub webhooks_update: u64,
}

impl EventCounters {
    pub fn new() -> EventCounters {
        EventCounters::default()
    }

    pub fn increment_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one received event of the given type. Derived diff events are
    /// not counted; they mirror an already-counted primary.
    pub fn increment(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::GuildCreate => &self.guild_create,
            EventKind::GuildUpdate => &self.guild_update,
            EventKind::GuildDelete => &self.guild_delete,
            EventKind::GuildMemberAdd => &self.guild_member_add,
            EventKind::GuildMemberUpdate => &self.guild_member_update,
            EventKind::GuildMemberRemove => &self.guild_member_remove,
            EventKind::GuildMembersChunk => &self.guild_members_chunk,
            EventKind::GuildRoleCreate => &self.guild_role_create,
            EventKind::GuildRoleUpdate => &self.guild_role_update,
            EventKind::GuildRoleDelete => &self.guild_role_delete,
            EventKind::GuildEmojisUpdate => &self.guild_emojis_update,
            EventKind::ChannelCreate => &self.channel_create,
            EventKind::ChannelUpdate => &self.channel_update,
            EventKind::ChannelDelete => &self.channel_delete,
            EventKind::ChannelPinsUpdate => &self.channel_pins_update,
            EventKind::MessageCreate => &self.message_create,
            EventKind::MessageUpdate => &self.message_update,
            EventKind::MessageDelete => &self.message_delete,
            EventKind::PresenceUpdate => &self.presence_update,
            EventKind::GuildBanAdd => &self.guild_ban_add,
            EventKind::GuildBanRemove => &self.guild_ban_remove,
            EventKind::MessageReactionAdd => &self.reaction_add,
            EventKind::MessageReactionRemove => &self.reaction_remove,
            EventKind::MessageReactionRemoveAll => &self.reaction_remove_all,
            EventKind::WebhooksUpdate => &self.webhooks_update,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EventCountersSnapshot {
        EventCountersSnapshot {
            discarded: self.discarded.load(Ordering::Relaxed),
            guild_create: self.guild_create.load(Ordering::Relaxed),
            guild_update: self.guild_update.load(Ordering::Relaxed),
            guild_delete: self.guild_delete.load(Ordering::Relaxed),
            guild_member_add: self.guild_member_add.load(Ordering::Relaxed),
            guild_member_update: self.guild_member_update.load(Ordering::Relaxed),
            guild_member_remove: self.guild_member_remove.load(Ordering::Relaxed),
            guild_members_chunk: self.guild_members_chunk.load(Ordering::Relaxed),
            guild_role_create: self.guild_role_create.load(Ordering::Relaxed),
            guild_role_update: self.guild_role_update.load(Ordering::Relaxed),
            guild_role_delete: self.guild_role_delete.load(Ordering::Relaxed),
            guild_emojis_update: self.guild_emojis_update.load(Ordering::Relaxed),
            channel_create: self.channel_create.load(Ordering::Relaxed),
            channel_update: self.channel_update.load(Ordering::Relaxed),
            channel_delete: self.channel_delete.load(Ordering::Relaxed),
            channel_pins_update: self.channel_pins_update.load(Ordering::Relaxed),
            message_create: self.message_create.load(Ordering::Relaxed),
            message_update: self.message_update.load(Ordering::Relaxed),
            message_delete: self.message_delete.load(Ordering::Relaxed),
            presence_update: self.presence_update.load(Ordering::Relaxed),
            guild_ban_add: self.guild_ban_add.load(Ordering::Relaxed),
            guild_ban_remove: self.guild_ban_remove.load(Ordering::Relaxed),
            reaction_add: self.reaction_add.load(Ordering::Relaxed),
            reaction_remove: self.reaction_remove.load(Ordering::Relaxed),
            reaction_remove_all: self.reaction_remove_all.load(Ordering::Relaxed),
            webhooks_update: self.webhooks_update.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_snapshot() {
        let counters = EventCounters::new();
        counters.increment(EventKind::MessageCreate);
        counters.increment(EventKind::MessageCreate);
        counters.increment(EventKind::GuildCreate);
        counters.increment_discarded();
        // Diff kinds are ignored.
        counters.increment(EventKind::DiffGuild);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.message_create, 2);
        assert_eq!(snapshot.guild_create, 1);
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(snapshot.guild_update, 0);
    }
}
