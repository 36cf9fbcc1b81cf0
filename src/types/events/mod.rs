// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

pub use channel::*;
pub use guild::*;
pub use heartbeat::*;
pub use hello::*;
pub use identify::*;
pub use message::*;
pub use presence::*;
pub use ready::*;
pub use request_members::*;
pub use webhooks::*;

mod channel;
mod guild;
mod heartbeat;
mod hello;
mod identify;
mod message;
mod presence;
mod ready;
mod request_members;
mod webhooks;

/// The payload used for sending events to the gateway
///
/// Similar to [GatewayReceivePayload], except we send a
/// [serde_json::value::Value] for d whilst we receive a
/// [serde_json::value::RawValue]. Also, we never need to send the event name
#[derive(Debug, Default, Serialize, Clone)]
pub struct GatewaySendPayload {
    #[serde(rename = "op")]
    pub op_code: u8,

    #[serde(rename = "d")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,

    #[serde(rename = "s")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
}

/// The payload used for receiving events from the gateway
#[derive(Debug, Default, Deserialize)]
pub struct GatewayReceivePayload<'a> {
    #[serde(rename = "op")]
    pub op_code: u8,

    #[serde(borrow)]
    #[serde(rename = "d")]
    pub event_data: Option<&'a serde_json::value::RawValue>,

    #[serde(rename = "s")]
    pub sequence_number: Option<u64>,

    #[serde(rename = "t")]
    pub event_name: Option<String>,
}

/// Every dispatch the fan-in consumes, decoded from the `t`/`d` pair of a
/// dispatch payload.
///
/// Dispatch names the pipeline does not consume decode to `None` in
/// [DispatchEvent::from_dispatch] and never reach the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Ready(GatewayReady),
    Resumed,
    GuildCreate(GuildCreate),
    GuildUpdate(GuildUpdate),
    GuildDelete(GuildDelete),
    GuildBanAdd(GuildBanAdd),
    GuildBanRemove(GuildBanRemove),
    GuildEmojisUpdate(GuildEmojisUpdate),
    GuildMemberAdd(GuildMemberAdd),
    GuildMemberUpdate(GuildMemberUpdate),
    GuildMemberRemove(GuildMemberRemove),
    GuildMembersChunk(GuildMembersChunk),
    GuildRoleCreate(GuildRoleCreate),
    GuildRoleUpdate(GuildRoleUpdate),
    GuildRoleDelete(GuildRoleDelete),
    ChannelCreate(ChannelCreate),
    ChannelUpdate(ChannelUpdate),
    ChannelDelete(ChannelDelete),
    ChannelPinsUpdate(ChannelPinsUpdate),
    MessageCreate(MessageCreate),
    MessageUpdate(MessageUpdate),
    MessageDelete(MessageDelete),
    MessageReactionAdd(MessageReactionAdd),
    MessageReactionRemove(MessageReactionRemove),
    MessageReactionRemoveAll(MessageReactionRemoveAll),
    PresenceUpdate(PresenceUpdate),
    WebhooksUpdate(WebhooksUpdate),
}

impl DispatchEvent {
    /// Decodes a dispatch by its wire name. Returns `Ok(None)` for dispatch
    /// names the pipeline does not consume.
    pub fn from_dispatch(
        event_name: &str,
        json: &str,
    ) -> Result<Option<DispatchEvent>, serde_json::Error> {
        use serde_json::from_str;

        let event = match event_name {
            "READY" => DispatchEvent::Ready(from_str(json)?),
            "RESUMED" => DispatchEvent::Resumed,
            "GUILD_CREATE" => DispatchEvent::GuildCreate(from_str(json)?),
            "GUILD_UPDATE" => DispatchEvent::GuildUpdate(from_str(json)?),
            "GUILD_DELETE" => DispatchEvent::GuildDelete(from_str(json)?),
            "GUILD_BAN_ADD" => DispatchEvent::GuildBanAdd(from_str(json)?),
            "GUILD_BAN_REMOVE" => DispatchEvent::GuildBanRemove(from_str(json)?),
            "GUILD_EMOJIS_UPDATE" => DispatchEvent::GuildEmojisUpdate(from_str(json)?),
            "GUILD_MEMBER_ADD" => DispatchEvent::GuildMemberAdd(from_str(json)?),
            "GUILD_MEMBER_UPDATE" => DispatchEvent::GuildMemberUpdate(from_str(json)?),
            "GUILD_MEMBER_REMOVE" => DispatchEvent::GuildMemberRemove(from_str(json)?),
            "GUILD_MEMBERS_CHUNK" => DispatchEvent::GuildMembersChunk(from_str(json)?),
            "GUILD_ROLE_CREATE" => DispatchEvent::GuildRoleCreate(from_str(json)?),
            "GUILD_ROLE_UPDATE" => DispatchEvent::GuildRoleUpdate(from_str(json)?),
            "GUILD_ROLE_DELETE" => DispatchEvent::GuildRoleDelete(from_str(json)?),
            "CHANNEL_CREATE" => DispatchEvent::ChannelCreate(from_str(json)?),
            "CHANNEL_UPDATE" => DispatchEvent::ChannelUpdate(from_str(json)?),
            "CHANNEL_DELETE" => DispatchEvent::ChannelDelete(from_str(json)?),
            "CHANNEL_PINS_UPDATE" => DispatchEvent::ChannelPinsUpdate(from_str(json)?),
            "MESSAGE_CREATE" => DispatchEvent::MessageCreate(from_str(json)?),
            "MESSAGE_UPDATE" => DispatchEvent::MessageUpdate(from_str(json)?),
            "MESSAGE_DELETE" => DispatchEvent::MessageDelete(from_str(json)?),
            "MESSAGE_REACTION_ADD" => DispatchEvent::MessageReactionAdd(from_str(json)?),
            "MESSAGE_REACTION_REMOVE" => DispatchEvent::MessageReactionRemove(from_str(json)?),
            "MESSAGE_REACTION_REMOVE_ALL" => {
                DispatchEvent::MessageReactionRemoveAll(from_str(json)?)
            }
            "PRESENCE_UPDATE" => DispatchEvent::PresenceUpdate(from_str(json)?),
            "WEBHOOKS_UPDATE" => DispatchEvent::WebhooksUpdate(from_str(json)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    /// The wire name this dispatch was delivered under.
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::Ready(_) => "READY",
            DispatchEvent::Resumed => "RESUMED",
            DispatchEvent::GuildCreate(_) => "GUILD_CREATE",
            DispatchEvent::GuildUpdate(_) => "GUILD_UPDATE",
            DispatchEvent::GuildDelete(_) => "GUILD_DELETE",
            DispatchEvent::GuildBanAdd(_) => "GUILD_BAN_ADD",
            DispatchEvent::GuildBanRemove(_) => "GUILD_BAN_REMOVE",
            DispatchEvent::GuildEmojisUpdate(_) => "GUILD_EMOJIS_UPDATE",
            DispatchEvent::GuildMemberAdd(_) => "GUILD_MEMBER_ADD",
            DispatchEvent::GuildMemberUpdate(_) => "GUILD_MEMBER_UPDATE",
            DispatchEvent::GuildMemberRemove(_) => "GUILD_MEMBER_REMOVE",
            DispatchEvent::GuildMembersChunk(_) => "GUILD_MEMBERS_CHUNK",
            DispatchEvent::GuildRoleCreate(_) => "GUILD_ROLE_CREATE",
            DispatchEvent::GuildRoleUpdate(_) => "GUILD_ROLE_UPDATE",
            DispatchEvent::GuildRoleDelete(_) => "GUILD_ROLE_DELETE",
            DispatchEvent::ChannelCreate(_) => "CHANNEL_CREATE",
            DispatchEvent::ChannelUpdate(_) => "CHANNEL_UPDATE",
            DispatchEvent::ChannelDelete(_) => "CHANNEL_DELETE",
            DispatchEvent::ChannelPinsUpdate(_) => "CHANNEL_PINS_UPDATE",
            DispatchEvent::MessageCreate(_) => "MESSAGE_CREATE",
            DispatchEvent::MessageUpdate(_) => "MESSAGE_UPDATE",
            DispatchEvent::MessageDelete(_) => "MESSAGE_DELETE",
            DispatchEvent::MessageReactionAdd(_) => "MESSAGE_REACTION_ADD",
            DispatchEvent::MessageReactionRemove(_) => "MESSAGE_REACTION_REMOVE",
            DispatchEvent::MessageReactionRemoveAll(_) => "MESSAGE_REACTION_REMOVE_ALL",
            DispatchEvent::PresenceUpdate(_) => "PRESENCE_UPDATE",
            DispatchEvent::WebhooksUpdate(_) => "WEBHOOKS_UPDATE",
        }
    }
}
