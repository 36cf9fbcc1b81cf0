// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains all the errors that can be returned by the gateway.

use std::time::Duration;

use thiserror::Error;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Top-level error for service initialisation and the event pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    MissingVariable { name: &'static str },
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors surfaced by the key-value store client.
///
/// The store backs deduplication, shared state and the whitelist; callers
/// decide per call site whether a failure is fatal (see the handler's
/// fail-open rules).
#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store connection failed: {0}")]
    Connection(String),
    #[error("key-value operation failed: {0}")]
    Operation(String),
    #[error("key-value call exceeded the {0:?} deadline")]
    Timeout(Duration),
    #[error("stored value at {key} could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the deduplicator.
#[derive(Debug, Error)]
pub enum DedupError {
    /// A claim with an empty cache key would collide across all events.
    #[error("passed cache key is empty")]
    EmptyKey,
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Errors raised when publishing to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The publish failed but the channel is still believed to be usable.
    #[error("unable to publish on {routing_key}: {reason}")]
    Recoverable { routing_key: String, reason: String },
    /// The channel (or connection) is gone; the replica must terminate so
    /// the orchestrator restarts it with a fresh connection.
    #[error("broker channel is no longer usable: {reason}")]
    ChannelDead { reason: String },
}

impl PublishError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PublishError::ChannelDead { .. })
    }
}

/// Errors raised by a platform session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot connect to the platform gateway: {0}")]
    Connect(String),
    #[error("received non hello opcode ({opcode}) on initial connection")]
    NonHelloOnInitiate { opcode: u8 },
    #[error("platform session closed: {0}")]
    Closed(String),
    #[error("unable to send on the platform session: {0}")]
    Send(String),
}
