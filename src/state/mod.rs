// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The replica-shared view of platform objects, backed by the key-value
//! store so every replica reads and writes the same cache.
//!
//! Objects are stored by id and resolved on read; guild records embed their
//! roles and emoji but never their channels or members, which live under
//! their own keys with `;`-joined id indexes for cascade deletes. Races
//! between replicas resolve last-writer-wins at the object level; the one
//! first-writer-wins key is the owning-bot marker, written with SETNX.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::KvError;
use crate::kv::KeyValueStore;
use crate::types::{
    Channel, DispatchEvent, Guild, GuildMember, Invite, RoleObject, Webhook,
};

fn guild_key(guild_id: &str) -> String {
    format!("cacophony.state.guild.{guild_id}")
}

fn guild_bot_key(guild_id: &str) -> String {
    format!("cacophony.state.guild_bot.{guild_id}")
}

fn guild_ids_key(bot_id: &str) -> String {
    format!("cacophony.state.guild_ids.{bot_id}")
}

const BOTS_KEY: &str = "cacophony.state.bots";

fn member_key(guild_id: &str, user_id: &str) -> String {
    format!("cacophony.state.member.{guild_id}.{user_id}")
}

fn member_ids_key(guild_id: &str) -> String {
    format!("cacophony.state.member_ids.{guild_id}")
}

fn channel_key(channel_id: &str) -> String {
    format!("cacophony.state.channel.{channel_id}")
}

fn channel_ids_key(guild_id: &str) -> String {
    format!("cacophony.state.channel_ids.{guild_id}")
}

fn webhooks_key(guild_id: &str) -> String {
    format!("cacophony.state.webhooks.{guild_id}")
}

fn invites_key(guild_id: &str) -> String {
    format!("cacophony.state.invites.{guild_id}")
}

/// Cluster-shared state cache. Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct SharedState {
    kv: Arc<dyn KeyValueStore>,
}

impl SharedState {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> SharedState {
        SharedState { kv }
    }

    /// The idempotent state machine over the platform event variants.
    /// Unknown or stateless variants are no-ops.
    pub async fn apply(
        &self,
        bot_user_id: &str,
        dispatch: &DispatchEvent,
    ) -> Result<(), KvError> {
        match dispatch {
            DispatchEvent::Ready(ready) => {
                self.add_id(BOTS_KEY, bot_user_id).await?;
                for guild in &ready.guilds {
                    self.kv
                        .set_nx(&guild_bot_key(&guild.id), bot_user_id)
                        .await?;
                    self.add_id(&guild_ids_key(bot_user_id), &guild.id).await?;
                }
                Ok(())
            }
            DispatchEvent::GuildCreate(e) => {
                self.store_guild(&e.guild).await?;
                self.add_id(BOTS_KEY, bot_user_id).await?;
                self.kv
                    .set_nx(&guild_bot_key(&e.guild.id), bot_user_id)
                    .await?;
                self.add_id(&guild_ids_key(bot_user_id), &e.guild.id).await
            }
            DispatchEvent::GuildUpdate(e) => {
                let mut guild = e.guild.clone();
                if let Some(old) = self.guild(&guild.id).await? {
                    // Sparse updates keep the richer sets we already hold.
                    if guild.roles.is_empty() {
                        guild.roles = old.roles;
                    }
                    if guild.emojis.is_empty() {
                        guild.emojis = old.emojis;
                    }
                }
                self.store_guild(&guild).await
            }
            DispatchEvent::GuildDelete(e) => self.delete_guild(bot_user_id, &e.guild.id).await,
            DispatchEvent::GuildMemberAdd(e) => self.store_member(&e.guild_id, &e.member).await,
            DispatchEvent::GuildMemberUpdate(e) => {
                self.store_member(&e.guild_id, &e.member).await
            }
            DispatchEvent::GuildMemberRemove(e) => {
                self.kv.del(&member_key(&e.guild_id, &e.user.id)).await?;
                self.remove_id(&member_ids_key(&e.guild_id), &e.user.id).await
            }
            DispatchEvent::GuildMembersChunk(e) => {
                for member in &e.members {
                    self.store_member(&e.guild_id, member).await?;
                }
                Ok(())
            }
            DispatchEvent::GuildRoleCreate(e) => {
                self.upsert_role(&e.guild_id, &e.role).await
            }
            DispatchEvent::GuildRoleUpdate(e) => {
                self.upsert_role(&e.guild_id, &e.role).await
            }
            DispatchEvent::GuildRoleDelete(e) => {
                let Some(mut guild) = self.guild(&e.guild_id).await? else {
                    return Ok(());
                };
                guild.roles.retain(|role| role.id != e.role_id);
                self.put_json(&guild_key(&e.guild_id), &guild).await
            }
            DispatchEvent::GuildEmojisUpdate(e) => {
                let Some(mut guild) = self.guild(&e.guild_id).await? else {
                    return Ok(());
                };
                guild.emojis = e.emojis.clone();
                self.put_json(&guild_key(&e.guild_id), &guild).await
            }
            DispatchEvent::ChannelCreate(e) => self.store_channel(&e.channel).await,
            DispatchEvent::ChannelUpdate(e) => self.store_channel(&e.channel).await,
            DispatchEvent::ChannelDelete(e) => {
                self.kv.del(&channel_key(&e.channel.id)).await?;
                if let Some(guild_id) = &e.channel.guild_id {
                    self.remove_id(&channel_ids_key(guild_id), &e.channel.id).await?;
                }
                Ok(())
            }
            DispatchEvent::ChannelPinsUpdate(e) => {
                let Some(mut channel) = self.channel(&e.channel_id).await? else {
                    return Ok(());
                };
                channel.last_pin_timestamp = e.last_pin_timestamp;
                self.put_json(&channel_key(&e.channel_id), &channel).await
            }
            DispatchEvent::PresenceUpdate(e) => {
                let Some(guild_id) = &e.guild_id else {
                    return Ok(());
                };
                let Some(mut member) = self.member(guild_id, &e.user.id).await? else {
                    return Ok(());
                };
                if !e.roles.is_empty() {
                    member.roles = e.roles.clone();
                }
                self.put_json(&member_key(guild_id, &e.user.id), &member).await
            }
            _ => Ok(()),
        }
    }

    pub async fn guild(&self, guild_id: &str) -> Result<Option<Guild>, KvError> {
        self.get_json(&guild_key(guild_id)).await
    }

    pub async fn member(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<Option<GuildMember>, KvError> {
        self.get_json(&member_key(guild_id, user_id)).await
    }

    pub async fn channel(&self, channel_id: &str) -> Result<Option<Channel>, KvError> {
        self.get_json(&channel_key(channel_id)).await
    }

    pub async fn role(
        &self,
        guild_id: &str,
        role_id: &str,
    ) -> Result<Option<RoleObject>, KvError> {
        let Some(guild) = self.guild(guild_id).await? else {
            return Ok(None);
        };
        Ok(guild.roles.into_iter().find(|role| role.id == role_id))
    }

    pub async fn guild_webhooks(&self, guild_id: &str) -> Result<Vec<Webhook>, KvError> {
        Ok(self
            .get_json(&webhooks_key(guild_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn guild_invites(&self, guild_id: &str) -> Result<Vec<Invite>, KvError> {
        Ok(self
            .get_json(&invites_key(guild_id))
            .await?
            .unwrap_or_default())
    }

    /// Webhook lists arrive from the platform's REST surface, outside the
    /// event stream; this is the write side of that collaboration.
    pub async fn put_guild_webhooks(
        &self,
        guild_id: &str,
        webhooks: &[Webhook],
    ) -> Result<(), KvError> {
        self.put_json(&webhooks_key(guild_id), &webhooks).await
    }

    pub async fn put_guild_invites(
        &self,
        guild_id: &str,
        invites: &[Invite],
    ) -> Result<(), KvError> {
        self.put_json(&invites_key(guild_id), &invites).await
    }

    /// The bot identity responsible for a guild's backfill.
    pub async fn bot_for_guild(&self, guild_id: &str) -> Result<Option<String>, KvError> {
        self.kv.get(&guild_bot_key(guild_id)).await
    }

    /// Union of the per-bot guild id lists.
    pub async fn all_guild_ids(&self) -> Result<Vec<String>, KvError> {
        let mut seen = std::collections::HashSet::new();
        let mut all = Vec::new();
        for bot_id in self.id_list(BOTS_KEY).await? {
            for guild_id in self.id_list(&guild_ids_key(&bot_id)).await? {
                if seen.insert(guild_id.clone()) {
                    all.push(guild_id);
                }
            }
        }
        Ok(all)
    }

    async fn store_guild(&self, guild: &Guild) -> Result<(), KvError> {
        // Channels and members are stored under their own keys; the guild
        // record keeps ids out so reads never chase live back-pointers.
        let mut record = guild.clone();
        record.channels = Vec::new();
        record.members = Vec::new();
        self.put_json(&guild_key(&guild.id), &record).await?;

        for channel in &guild.channels {
            let mut channel = channel.clone();
            channel.guild_id.get_or_insert_with(|| guild.id.clone());
            self.store_channel(&channel).await?;
        }
        for member in &guild.members {
            self.store_member(&guild.id, member).await?;
        }
        Ok(())
    }

    async fn delete_guild(&self, bot_user_id: &str, guild_id: &str) -> Result<(), KvError> {
        for user_id in self.id_list(&member_ids_key(guild_id)).await? {
            self.kv.del(&member_key(guild_id, &user_id)).await?;
        }
        self.kv.del(&member_ids_key(guild_id)).await?;

        for channel_id in self.id_list(&channel_ids_key(guild_id)).await? {
            self.kv.del(&channel_key(&channel_id)).await?;
        }
        self.kv.del(&channel_ids_key(guild_id)).await?;

        self.kv.del(&webhooks_key(guild_id)).await?;
        self.kv.del(&invites_key(guild_id)).await?;
        self.kv.del(&guild_key(guild_id)).await?;
        self.kv.del(&guild_bot_key(guild_id)).await?;
        self.remove_id(&guild_ids_key(bot_user_id), guild_id).await
    }

    async fn store_member(&self, guild_id: &str, member: &GuildMember) -> Result<(), KvError> {
        let Some(user) = &member.user else {
            return Ok(());
        };
        let mut member = member.clone();
        member.guild_id = Some(guild_id.to_string());
        self.put_json(&member_key(guild_id, &user.id), &member).await?;
        self.add_id(&member_ids_key(guild_id), &user.id).await
    }

    async fn store_channel(&self, channel: &Channel) -> Result<(), KvError> {
        self.put_json(&channel_key(&channel.id), channel).await?;
        if let Some(guild_id) = &channel.guild_id {
            self.add_id(&channel_ids_key(guild_id), &channel.id).await?;
        }
        Ok(())
    }

    async fn upsert_role(&self, guild_id: &str, role: &RoleObject) -> Result<(), KvError> {
        let Some(mut guild) = self.guild(guild_id).await? else {
            return Ok(());
        };
        match guild.roles.iter_mut().find(|existing| existing.id == role.id) {
            Some(existing) => *existing = role.clone(),
            None => guild.roles.push(role.clone()),
        }
        self.put_json(&guild_key(guild_id), &guild).await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|source| KvError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), KvError> {
        let raw = serde_json::to_string(value).map_err(|source| KvError::Decode {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &raw).await
    }

    async fn id_list(&self, key: &str) -> Result<Vec<String>, KvError> {
        let raw = self.kv.get(key).await?.unwrap_or_default();
        Ok(raw
            .split(';')
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn add_id(&self, key: &str, id: &str) -> Result<(), KvError> {
        let mut ids = self.id_list(key).await?;
        if ids.iter().any(|existing| existing == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        self.kv.set(key, &ids.join(";")).await
    }

    async fn remove_id(&self, key: &str, id: &str) -> Result<(), KvError> {
        let mut ids = self.id_list(key).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(());
        }
        self.kv.set(key, &ids.join(";")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::types::{
        ChannelDelete, GuildCreate, GuildDelete, GuildMemberAdd, GuildRoleUpdate, UnavailableGuild,
        User,
    };

    fn state() -> SharedState {
        SharedState::new(Arc::new(MemoryStore::new()))
    }

    fn guild_fixture(id: &str, name: &str) -> Guild {
        Guild {
            id: id.to_string(),
            name: Some(name.to_string()),
            roles: vec![RoleObject {
                id: "7".to_string(),
                name: "mods".to_string(),
                ..Default::default()
            }],
            channels: vec![Channel {
                id: "C1".to_string(),
                name: Some("general".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    async fn create_guild(state: &SharedState, bot: &str, guild: Guild) {
        state
            .apply(bot, &DispatchEvent::GuildCreate(GuildCreate { guild }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_guild_create_records_owner_and_children() {
        let state = state();
        create_guild(&state, "B1", guild_fixture("100", "A")).await;

        let guild = state.guild("100").await.unwrap().unwrap();
        assert_eq!(guild.name.as_deref(), Some("A"));
        assert!(guild.channels.is_empty(), "children live under their own keys");

        assert_eq!(state.bot_for_guild("100").await.unwrap().unwrap(), "B1");
        let channel = state.channel("C1").await.unwrap().unwrap();
        assert_eq!(channel.guild_id.as_deref(), Some("100"));
        assert_eq!(state.all_guild_ids().await.unwrap(), vec!["100"]);
    }

    #[tokio::test]
    async fn test_owner_election_is_first_writer_wins() {
        let state = state();
        create_guild(&state, "B1", guild_fixture("100", "A")).await;
        create_guild(&state, "B2", guild_fixture("100", "A")).await;

        assert_eq!(state.bot_for_guild("100").await.unwrap().unwrap(), "B1");
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let state = state();
        let member = GuildMemberAdd {
            member: GuildMember {
                user: Some(User {
                    id: "U1".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            guild_id: "100".to_string(),
        };

        create_guild(&state, "B1", guild_fixture("100", "A")).await;
        let dispatch = DispatchEvent::GuildMemberAdd(member);
        state.apply("B1", &dispatch).await.unwrap();
        let once = state.member("100", "U1").await.unwrap();
        state.apply("B1", &dispatch).await.unwrap();
        let twice = state.member("100", "U1").await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(state.all_guild_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_update_replaces_by_id() {
        let state = state();
        create_guild(&state, "B1", guild_fixture("100", "A")).await;

        state
            .apply(
                "B1",
                &DispatchEvent::GuildRoleUpdate(GuildRoleUpdate {
                    guild_id: "100".to_string(),
                    role: RoleObject {
                        id: "7".to_string(),
                        name: "admins".to_string(),
                        ..Default::default()
                    },
                }),
            )
            .await
            .unwrap();

        let role = state.role("100", "7").await.unwrap().unwrap();
        assert_eq!(role.name, "admins");
        assert_eq!(state.guild("100").await.unwrap().unwrap().roles.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_delete_removes_the_channel() {
        let state = state();
        create_guild(&state, "B1", guild_fixture("100", "A")).await;

        state
            .apply(
                "B1",
                &DispatchEvent::ChannelDelete(ChannelDelete {
                    channel: Channel {
                        id: "C1".to_string(),
                        guild_id: Some("100".to_string()),
                        ..Default::default()
                    },
                }),
            )
            .await
            .unwrap();

        assert!(state.channel("C1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guild_delete_cascades() {
        let state = state();
        create_guild(&state, "B1", guild_fixture("100", "A")).await;

        state
            .apply(
                "B1",
                &DispatchEvent::GuildDelete(GuildDelete {
                    guild: UnavailableGuild {
                        id: "100".to_string(),
                        unavailable: None,
                    },
                }),
            )
            .await
            .unwrap();

        assert!(state.guild("100").await.unwrap().is_none());
        assert!(state.channel("C1").await.unwrap().is_none());
        assert!(state.bot_for_guild("100").await.unwrap().is_none());
        assert!(state.all_guild_ids().await.unwrap().is_empty());
    }
}
