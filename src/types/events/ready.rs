// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::entities::{UnavailableGuild, User};

/// Received after identifying; carries the session's bot user and the
/// (initially unavailable) guilds the bot is in.
///
/// See <https://discord.com/developers/docs/topics/gateway-events#ready>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GatewayReady {
    #[serde(rename = "v")]
    #[serde(default)]
    pub version: u8,
    pub user: User,
    pub session_id: String,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}
