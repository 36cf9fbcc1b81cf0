// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::entities::{Message, PartialEmoji};

/// See <https://discord.com/developers/docs/topics/gateway-events#message-create>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct MessageCreate {
    #[serde(flatten)]
    pub message: Message,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#message-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct MessageUpdate {
    #[serde(flatten)]
    pub message: Message,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#message-delete>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

/// The reaction body shared by the reaction events.
///
/// See <https://discord.com/developers/docs/topics/gateway-events#message-reaction-add>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageReaction {
    pub user_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub guild_id: Option<String>,
    pub emoji: PartialEmoji,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#message-reaction-add>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageReactionAdd {
    #[serde(flatten)]
    pub reaction: MessageReaction,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#message-reaction-remove>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageReactionRemove {
    #[serde(flatten)]
    pub reaction: MessageReaction,
}

/// See <https://discord.com/developers/docs/topics/gateway-events#message-reaction-remove-all>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageReactionRemoveAll {
    pub channel_id: String,
    pub message_id: String,
    pub guild_id: Option<String>,
}
