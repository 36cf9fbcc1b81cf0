// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::entities::Channel;

/// See <https://discord.com/developers/docs/topics/gateway-events#channel-create>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelCreate {
    #[serde(flatten)]
    pub channel: Channel,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#channel-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    #[serde(flatten)]
    pub channel: Channel,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#channel-delete>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelDelete {
    #[serde(flatten)]
    pub channel: Channel,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#channel-pins-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelPinsUpdate {
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}
