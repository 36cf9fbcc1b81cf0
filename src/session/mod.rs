// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Platform sessions: the connector/connection seam the pipeline talks to,
//! the websocket implementation behind it, and the supervisor that runs one
//! session per bot identity.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::types::{DispatchEvent, Intents};

pub use connection::TungsteniteConnector;
pub use supervisor::{Supervisor, SHUTDOWN_GRACE};

mod connection;
mod supervisor;

// Gateway opcodes
/// Opcode received when the server dispatches an event
pub const GATEWAY_DISPATCH: u8 = 0;
/// Opcode sent when sending a heartbeat
pub const GATEWAY_HEARTBEAT: u8 = 1;
/// Opcode sent to initiate a session
pub const GATEWAY_IDENTIFY: u8 = 2;
/// Opcode sent to resume a session
pub const GATEWAY_RESUME: u8 = 6;
/// Opcode received to tell the client to reconnect
pub const GATEWAY_RECONNECT: u8 = 7;
/// Opcode sent to request guild member data
pub const GATEWAY_REQUEST_GUILD_MEMBERS: u8 = 8;
/// Opcode received to tell the client their token / session is invalid
pub const GATEWAY_INVALID_SESSION: u8 = 9;
/// Opcode received when initially connecting to the gateway, starts our heartbeat
pub const GATEWAY_HELLO: u8 = 10;
/// Opcode received to acknowledge a heartbeat
pub const GATEWAY_HEARTBEAT_ACK: u8 = 11;

/// One bot identity; drives one session.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub bot_id: String,
    pub token: String,
}

/// The send side of one live platform session. The inbound side is the
/// dispatch receiver handed out when the session is opened; events arrive
/// on it in delivery order.
#[async_trait]
pub trait PlatformConnection: Send + Sync {
    /// Requests a full member enumeration for one guild.
    async fn request_members(
        &self,
        guild_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<(), SessionError>;

    /// The batch form: one request covering several guilds.
    async fn request_members_batch(&self, guild_ids: &[String]) -> Result<(), SessionError>;

    /// Tears the session down; the dispatch receiver closes afterwards.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Opens platform sessions. The production implementation speaks the
/// websocket protocol; tests substitute scripted sessions.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn open(
        &self,
        identity: &BotIdentity,
        intents: Intents,
    ) -> Result<(Arc<dyn PlatformConnection>, mpsc::Receiver<DispatchEvent>), SessionError>;
}
