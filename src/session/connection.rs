// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The websocket session: hello, identify, heartbeats and dispatch
//! decoding. Reconnects re-identify; the dispatch channel survives
//! reconnects so the consumer never notices beyond a gap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{
    BotIdentity, PlatformConnection, PlatformConnector, GATEWAY_DISPATCH, GATEWAY_HEARTBEAT,
    GATEWAY_HEARTBEAT_ACK, GATEWAY_HELLO, GATEWAY_IDENTIFY, GATEWAY_INVALID_SESSION,
    GATEWAY_RECONNECT, GATEWAY_REQUEST_GUILD_MEMBERS,
};
use crate::errors::SessionError;
use crate::types::{
    DispatchEvent, GatewayHeartbeat, GatewayIdentifyPayload, GatewayReceivePayload,
    GatewayRequestGuildMembers, GatewaySendPayload, HelloData, Intents,
};

const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=6&encoding=json";

/// Reconnect backoff ceiling in seconds.
const MAX_BACKOFF_SECS: u64 = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = SplitSink<Socket, Message>;
type Stream = SplitStream<Socket>;

/// Opens real websocket sessions against the platform gateway.
pub struct TungsteniteConnector {
    url: String,
}

impl TungsteniteConnector {
    pub fn new() -> TungsteniteConnector {
        TungsteniteConnector {
            url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    pub fn with_url(url: &str) -> TungsteniteConnector {
        TungsteniteConnector {
            url: url.to_string(),
        }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        TungsteniteConnector::new()
    }
}

#[async_trait]
impl PlatformConnector for TungsteniteConnector {
    async fn open(
        &self,
        identity: &BotIdentity,
        intents: Intents,
    ) -> Result<(Arc<dyn PlatformConnection>, mpsc::Receiver<DispatchEvent>), SessionError> {
        // The first connect happens here so a bad token or unreachable
        // gateway fails session startup instead of looping in the driver.
        let (sink, stream, heartbeat_interval) =
            connect_session(&self.url, &identity.token, intents).await?;

        let (events_send, events_receive) = mpsc::channel(256);
        let (outbound_send, outbound_receive) = mpsc::channel(64);
        let (kill_send, _) = broadcast::channel(16);

        let session = GatewaySession {
            bot_id: identity.bot_id.clone(),
            outbound: outbound_send,
            kill: kill_send.clone(),
        };

        let driver = Driver {
            url: self.url.clone(),
            token: identity.token.clone(),
            intents,
            events: events_send,
            outbound: outbound_receive,
            kill: kill_send,
        };
        tokio::spawn(driver.run(sink, stream, heartbeat_interval));

        Ok((Arc::new(session), events_receive))
    }
}

/// The send half handed to the supervisor and the member backfill.
struct GatewaySession {
    bot_id: String,
    outbound: mpsc::Sender<GatewaySendPayload>,
    kill: broadcast::Sender<()>,
}

impl GatewaySession {
    async fn send_payload(
        &self,
        op_code: u8,
        event_data: serde_json::Value,
    ) -> Result<(), SessionError> {
        self.outbound
            .send(GatewaySendPayload {
                op_code,
                event_data: Some(event_data),
                sequence_number: None,
            })
            .await
            .map_err(|_| SessionError::Send("session driver is gone".to_string()))
    }

    async fn send_member_request(
        &self,
        request: GatewayRequestGuildMembers,
    ) -> Result<(), SessionError> {
        trace!(bot_id = %self.bot_id, "GW: Sending Request Guild Members..");
        let data = serde_json::to_value(&request)
            .map_err(|err| SessionError::Send(err.to_string()))?;
        self.send_payload(GATEWAY_REQUEST_GUILD_MEMBERS, data).await
    }
}

#[async_trait]
impl PlatformConnection for GatewaySession {
    async fn request_members(
        &self,
        guild_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<(), SessionError> {
        self.send_member_request(GatewayRequestGuildMembers::all_members(
            guild_id, query, limit,
        ))
        .await
    }

    async fn request_members_batch(&self, guild_ids: &[String]) -> Result<(), SessionError> {
        self.send_member_request(GatewayRequestGuildMembers::batch(guild_ids))
            .await
    }

    async fn close(&self) -> Result<(), SessionError> {
        let _ = self.kill.send(());
        Ok(())
    }
}

/// Connects, waits for hello and identifies; the socket is ready for the
/// event loop afterwards.
async fn connect_session(
    url: &str,
    token: &str,
    intents: Intents,
) -> Result<(Sink, Stream, Duration), SessionError> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|err| SessionError::Connect(err.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    let first = stream
        .next()
        .await
        .ok_or_else(|| SessionError::Closed("socket closed before hello".to_string()))?
        .map_err(|err| SessionError::Closed(err.to_string()))?;
    let text = first
        .into_text()
        .map_err(|err| SessionError::Connect(err.to_string()))?;
    let payload: GatewayReceivePayload =
        serde_json::from_str(&text).map_err(|err| SessionError::Connect(err.to_string()))?;

    if payload.op_code != GATEWAY_HELLO {
        return Err(SessionError::NonHelloOnInitiate {
            opcode: payload.op_code,
        });
    }

    let hello: HelloData = payload
        .event_data
        .ok_or_else(|| SessionError::Connect("hello carried no data".to_string()))
        .and_then(|raw| {
            serde_json::from_str(raw.get()).map_err(|err| SessionError::Connect(err.to_string()))
        })?;

    debug!("GW: Received Hello");

    let identify = GatewayIdentifyPayload::for_token(token, intents);
    let identify_data =
        serde_json::to_value(&identify).map_err(|err| SessionError::Send(err.to_string()))?;
    send_on_socket(&mut sink, GATEWAY_IDENTIFY, Some(identify_data)).await?;

    Ok((
        sink,
        stream,
        Duration::from_millis(hello.heartbeat_interval),
    ))
}

async fn send_on_socket(
    sink: &mut Sink,
    op_code: u8,
    event_data: Option<serde_json::Value>,
) -> Result<(), SessionError> {
    let payload = GatewaySendPayload {
        op_code,
        event_data,
        sequence_number: None,
    };
    let json = serde_json::to_string(&payload).map_err(|err| SessionError::Send(err.to_string()))?;
    sink.send(Message::Text(json))
        .await
        .map_err(|err| SessionError::Send(err.to_string()))
}

struct Driver {
    url: String,
    token: String,
    intents: Intents,
    events: mpsc::Sender<DispatchEvent>,
    outbound: mpsc::Receiver<GatewaySendPayload>,
    kill: broadcast::Sender<()>,
}

enum LoopEnd {
    Kill,
    Reconnect,
    ConsumerGone,
}

impl Driver {
    async fn run(mut self, sink: Sink, stream: Stream, heartbeat_interval: Duration) {
        let mut kill_receive = self.kill.subscribe();
        let mut current = Some((sink, stream, heartbeat_interval));
        let mut backoff = 1u64;

        loop {
            let (sink, stream, heartbeat_interval) = match current.take() {
                Some(connected) => connected,
                None => {
                    match connect_session(&self.url, &self.token, self.intents).await {
                        Ok(connected) => {
                            backoff = 1;
                            connected
                        }
                        Err(err) => {
                            warn!(error = %err, "GW: reconnect failed, backing off");
                            tokio::select! {
                                _ = kill_receive.recv() => return,
                                _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                            }
                            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                            continue;
                        }
                    }
                }
            };

            match self
                .socket_loop(sink, stream, heartbeat_interval, &mut kill_receive)
                .await
            {
                LoopEnd::Kill | LoopEnd::ConsumerGone => return,
                LoopEnd::Reconnect => {
                    info!("GW: connection lost, reconnecting");
                }
            }
        }
    }

    async fn socket_loop(
        &mut self,
        mut sink: Sink,
        mut stream: Stream,
        heartbeat_interval: Duration,
        kill_receive: &mut broadcast::Receiver<()>,
    ) -> LoopEnd {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first tick doubles as the initial heartbeat.
        let mut last_sequence: Option<u64> = None;
        let mut acknowledged = true;

        loop {
            tokio::select! {
                _ = kill_receive.recv() => {
                    trace!("GW: Closing session");
                    let _ = sink.send(Message::Close(None)).await;
                    return LoopEnd::Kill;
                }
                Some(payload) = self.outbound.recv() => {
                    let json = match serde_json::to_string(&payload) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, "GW: dropping unserializable outbound payload");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        warn!("GW: websocket is broken, reconnecting");
                        return LoopEnd::Reconnect;
                    }
                }
                _ = ticker.tick() => {
                    if !acknowledged {
                        warn!("GW: heartbeat was not acknowledged, reconnecting");
                        return LoopEnd::Reconnect;
                    }
                    trace!("GW: Sending Heartbeat..");
                    let heartbeat = GatewayHeartbeat {
                        op: GATEWAY_HEARTBEAT,
                        d: last_sequence,
                    };
                    let json = match serde_json::to_string(&heartbeat) {
                        Ok(json) => json,
                        Err(_) => continue,
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        warn!("GW: couldnt send heartbeat, websocket seems broken");
                        return LoopEnd::Reconnect;
                    }
                    acknowledged = false;
                }
                received = stream.next() => {
                    let message = match received {
                        Some(Ok(message)) => message,
                        Some(Err(err)) => {
                            warn!(error = %err, "GW: websocket error, reconnecting");
                            return LoopEnd::Reconnect;
                        }
                        None => {
                            warn!("GW: websocket closed, reconnecting");
                            return LoopEnd::Reconnect;
                        }
                    };

                    let text = match message {
                        Message::Text(text) => text,
                        Message::Close(frame) => {
                            warn!(?frame, "GW: received close frame, reconnecting");
                            return LoopEnd::Reconnect;
                        }
                        _ => continue,
                    };

                    match self.handle_text(&text, &mut sink, &mut last_sequence, &mut acknowledged).await {
                        Ok(true) => {}
                        Ok(false) => return LoopEnd::ConsumerGone,
                        Err(end) => return end,
                    }
                }
            }
        }
    }

    /// Returns Ok(false) when the dispatch consumer hung up.
    async fn handle_text(
        &self,
        text: &str,
        sink: &mut Sink,
        last_sequence: &mut Option<u64>,
        acknowledged: &mut bool,
    ) -> Result<bool, LoopEnd> {
        let payload: GatewayReceivePayload = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "GW: unparseable gateway payload");
                return Ok(true);
            }
        };

        if let Some(sequence) = payload.sequence_number {
            *last_sequence = Some(sequence);
        }

        match payload.op_code {
            GATEWAY_DISPATCH => {
                let Some(event_name) = payload.event_name else {
                    warn!("Gateway dispatch op without event_name");
                    return Ok(true);
                };
                let Some(data) = payload.event_data else {
                    return Ok(true);
                };

                trace!("Gateway: Received {event_name}");

                match DispatchEvent::from_dispatch(&event_name, data.get()) {
                    Ok(Some(event)) => {
                        if self.events.send(event).await.is_err() {
                            return Ok(false);
                        }
                    }
                    Ok(None) => {
                        trace!("Gateway: not forwarding {event_name}");
                    }
                    Err(err) => {
                        warn!("Failed to parse gateway event {event_name} ({err})");
                    }
                }
            }
            GATEWAY_HEARTBEAT => {
                trace!("GW: Received Heartbeat // Heartbeat Request");
                let heartbeat = GatewayHeartbeat {
                    op: GATEWAY_HEARTBEAT,
                    d: *last_sequence,
                };
                if let Ok(json) = serde_json::to_string(&heartbeat) {
                    if sink.send(Message::Text(json)).await.is_err() {
                        return Err(LoopEnd::Reconnect);
                    }
                }
            }
            GATEWAY_HEARTBEAT_ACK => {
                trace!("GW: Received Heartbeat ACK");
                *acknowledged = true;
            }
            GATEWAY_RECONNECT => {
                trace!("GW: Received Reconnect");
                return Err(LoopEnd::Reconnect);
            }
            GATEWAY_INVALID_SESSION => {
                warn!("GW: session invalidated, re-identifying");
                return Err(LoopEnd::Reconnect);
            }
            GATEWAY_HELLO => {
                warn!("Received hello when it was unexpected");
            }
            other => {
                trace!("GW: ignoring opcode {other}");
            }
        }

        Ok(true)
    }
}
