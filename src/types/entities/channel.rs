// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// See <https://discord.com/developers/docs/resources/channel#channel-object>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    #[serde(default)]
    pub channel_type: u8,
    pub guild_id: Option<String>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i32>,
    pub nsfw: Option<bool>,
    pub parent_id: Option<String>,
    pub last_message_id: Option<String>,
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}
