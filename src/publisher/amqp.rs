// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use super::Publisher;
use crate::errors::PublishError;

/// Transient delivery; the broker drops the message instead of persisting
/// it when the queue is gone.
const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// Bound on a single publish; a wedged channel must not stall the
/// delivery task indefinitely.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(15);

/// AMQP-backed [Publisher] over one channel on a durable topic exchange.
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    /// Dials the broker, opens a channel and declares the topic exchange.
    pub async fn connect(dsn: &str, exchange: &str) -> Result<AmqpPublisher, PublishError> {
        let connection = Connection::connect(dsn, ConnectionProperties::default())
            .await
            .map_err(|err| PublishError::ChannelDead {
                reason: format!("cannot connect: {err}"),
            })?;

        let channel =
            connection
                .create_channel()
                .await
                .map_err(|err| PublishError::ChannelDead {
                    reason: format!("cannot open channel: {err}"),
                })?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| PublishError::ChannelDead {
                reason: format!("cannot declare exchange: {err}"),
            })?;

        Ok(AmqpPublisher {
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(
        &self,
        routing_key: &str,
        body: Vec<u8>,
        expiration: Duration,
    ) -> Result<(), PublishError> {
        if !self.channel.status().connected() {
            return Err(PublishError::ChannelDead {
                reason: "channel is closed".to_string(),
            });
        }

        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_delivery_mode(DELIVERY_MODE_TRANSIENT)
            .with_expiration(ShortString::from(expiration.as_millis().to_string()));

        let publish = self.channel.basic_publish(
            &self.exchange,
            routing_key,
            BasicPublishOptions::default(),
            &body,
            properties,
        );

        tokio::time::timeout(PUBLISH_TIMEOUT, publish)
            .await
            .map_err(|_| PublishError::Recoverable {
                routing_key: routing_key.to_string(),
                reason: format!("publish exceeded the {PUBLISH_TIMEOUT:?} deadline"),
            })?
            .map_err(|err| {
                if self.channel.status().connected() {
                    PublishError::Recoverable {
                        routing_key: routing_key.to_string(),
                        reason: err.to_string(),
                    }
                } else {
                    PublishError::ChannelDead {
                        reason: err.to_string(),
                    }
                }
            })?;

        Ok(())
    }
}
