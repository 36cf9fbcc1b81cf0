// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// See <https://discord.com/developers/docs/topics/gateway-events#identify>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GatewayIdentifyPayload {
    pub token: String,
    pub properties: GatewayIdentifyConnectionProps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
    pub intents: Intents,
}

impl GatewayIdentifyPayload {
    /// An identify for one gateway fan-in session with the given token.
    pub fn for_token(token: &str, intents: Intents) -> Self {
        Self {
            token: token.to_string(),
            properties: GatewayIdentifyConnectionProps::default(),
            compress: Some(false),
            large_threshold: None,
            intents,
        }
    }
}

/// See <https://discord.com/developers/docs/topics/gateway-events#identify-identify-connection-properties>
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GatewayIdentifyConnectionProps {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for GatewayIdentifyConnectionProps {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: String::from("cacophony-gateway"),
            device: String::from("cacophony-gateway"),
        }
    }
}

bitflags! {
    /// The intents bitset sent with identify, selecting which event groups
    /// the platform delivers on this session.
    ///
    /// See <https://discord.com/developers/docs/topics/gateway#gateway-intents>
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        const GUILDS = 1 << 0;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_MODERATION = 1 << 2;
        const GUILD_EMOJIS = 1 << 3;
        const GUILD_WEBHOOKS = 1 << 5;
        const GUILD_INVITES = 1 << 6;
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const MESSAGE_CONTENT = 1 << 15;
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::empty()
    }
}

// On the wire intents are a plain integer bitset.
impl Serialize for Intents {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Intents, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(Intents::from_bits_retain(bits))
    }
}

impl Intents {
    /// Every event group the fan-in pipeline forwards.
    pub fn gateway_fanin() -> Intents {
        Intents::GUILDS
            | Intents::GUILD_MEMBERS
            | Intents::GUILD_MODERATION
            | Intents::GUILD_EMOJIS
            | Intents::GUILD_WEBHOOKS
            | Intents::GUILD_INVITES
            | Intents::GUILD_PRESENCES
            | Intents::GUILD_MESSAGES
            | Intents::GUILD_MESSAGE_REACTIONS
            | Intents::DIRECT_MESSAGES
            | Intents::DIRECT_MESSAGE_REACTIONS
            | Intents::MESSAGE_CONTENT
    }
}
