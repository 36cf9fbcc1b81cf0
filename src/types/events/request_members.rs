// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// Sent to request guild member chunks for one or more guilds; the platform
/// answers with [crate::types::GuildMembersChunk] events.
///
/// See <https://discord.com/developers/docs/topics/gateway-events#request-guild-members>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GatewayRequestGuildMembers {
    pub guild_id: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub limit: u32,
}

impl GatewayRequestGuildMembers {
    /// A full enumeration request for a single guild.
    pub fn all_members(guild_id: &str, query: &str, limit: u32) -> Self {
        Self {
            guild_id: vec![guild_id.to_string()],
            query: Some(query.to_string()),
            limit,
        }
    }

    /// The batch form: one request covering several guilds.
    pub fn batch(guild_ids: &[String]) -> Self {
        Self {
            guild_id: guild_ids.to_vec(),
            query: Some(String::new()),
            limit: 0,
        }
    }
}
