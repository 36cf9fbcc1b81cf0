// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Publishes events to the broker's topic exchange. The broker is the
//! retention boundary: every message carries the configured expiration.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::PublishError;

pub use amqp::AmqpPublisher;

mod amqp;

/// The broker seam. Routing keys are `cacophony.discord.<event-type>`.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        routing_key: &str,
        body: Vec<u8>,
        expiration: Duration,
    ) -> Result<(), PublishError>;
}

/// Records published messages in memory; the broker double used by tests.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    fail_with: Mutex<Option<PublishError>>,
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub expiration: Duration,
}

impl PublishedMessage {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

impl MemoryPublisher {
    pub fn new() -> MemoryPublisher {
        MemoryPublisher::default()
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn take_messages(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.messages.lock().unwrap())
    }

    /// Makes the next publish fail with the given error.
    pub fn fail_next(&self, error: PublishError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(
        &self,
        routing_key: &str,
        body: Vec<u8>,
        expiration: Duration,
    ) -> Result<(), PublishError> {
        if let Some(error) = self.fail_with.lock().unwrap().take() {
            return Err(error);
        }

        self.messages.lock().unwrap().push(PublishedMessage {
            routing_key: routing_key.to_string(),
            body,
            expiration,
        });
        Ok(())
    }
}
