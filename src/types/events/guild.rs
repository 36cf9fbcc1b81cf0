// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::entities::{Emoji, Guild, GuildMember, RoleObject, UnavailableGuild, User};

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-create>;
/// Received to give data about a guild;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildCreate {
    #[serde(flatten)]
    pub guild: Guild,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-update>;
/// Received to give info about a guild being updated;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildUpdate {
    #[serde(flatten)]
    pub guild: Guild,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-delete>;
/// Received to tell the client about a guild being deleted;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildDelete {
    #[serde(flatten)]
    pub guild: UnavailableGuild,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-ban-add>;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildBanAdd {
    pub guild_id: String,
    pub user: User,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-ban-remove>;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildBanRemove {
    pub guild_id: String,
    pub user: User,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-emojis-update>;
/// Received to tell the client about a change to a guild's emoji list;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildEmojisUpdate {
    pub guild_id: String,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-member-add>;
/// Received to tell the client about a user joining a guild;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildMemberAdd {
    #[serde(flatten)]
    pub member: GuildMember,
    pub guild_id: String,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-member-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildMemberUpdate {
    #[serde(flatten)]
    pub member: GuildMember,
    pub guild_id: String,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-member-remove>;
/// Received to tell the client about a user leaving a guild;
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildMemberRemove {
    pub guild_id: String,
    pub user: User,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-members-chunk>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildMembersChunk {
    pub guild_id: String,
    #[serde(default)]
    pub members: Vec<GuildMember>,
    #[serde(default)]
    pub chunk_index: u16,
    #[serde(default)]
    pub chunk_count: u16,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-role-create>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildRoleCreate {
    pub guild_id: String,
    pub role: RoleObject,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-role-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildRoleUpdate {
    pub guild_id: String,
    pub role: RoleObject,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#guild-role-delete>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildRoleDelete {
    pub guild_id: String,
    pub role_id: String,
}
