// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::entities::{Channel, Emoji, RoleObject, User};

/// See <https://discord.com/developers/docs/resources/guild>
///
/// Trimmed to the fields the gateway caches and diffs; everything else the
/// platform sends is dropped at deserialization.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Guild {
    pub id: String,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub splash: Option<String>,
    pub owner_id: Option<String>,
    pub region: Option<String>,
    pub afk_channel_id: Option<String>,
    pub afk_timeout: Option<i32>,
    pub verification_level: Option<u8>,
    pub large: Option<bool>,
    pub unavailable: Option<bool>,
    pub member_count: Option<i32>,
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<RoleObject>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<GuildMember>,
}

/// A guild the session knows about but has not received yet, or one that
/// just became unreachable.
///
/// See <https://discord.com/developers/docs/resources/guild#unavailable-guild-object>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct UnavailableGuild {
    pub id: String,
    pub unavailable: Option<bool>,
}

/// See <https://discord.com/developers/docs/resources/guild#guild-member-object>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct GuildMember {
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub premium_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}
