// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session supervision: one session per bot identity, a shutdown fan-out,
//! and nothing else. Reconnects and heartbeating belong to the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{error, info};

use super::{BotIdentity, PlatformConnection, PlatformConnector};
use crate::errors::{GatewayError, GatewayResult};
use crate::handler::{EventHandler, MemberBackfill};
use crate::state::SharedState;
use crate::types::{DispatchEvent, Intents};
use crate::whitelist::Checker;

/// How long shutdown waits for sessions before the process force-exits.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

pub struct Supervisor {
    connector: Arc<dyn PlatformConnector>,
    handler: Arc<EventHandler>,
    state: SharedState,
    checker: Checker,
    backfill_delay: Duration,
    kill: broadcast::Sender<()>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn PlatformConnector>,
        handler: Arc<EventHandler>,
        state: SharedState,
        checker: Checker,
        backfill_delay: Duration,
    ) -> Supervisor {
        let (kill, _) = broadcast::channel(16);
        Supervisor {
            connector,
            handler,
            state,
            checker,
            backfill_delay,
            kill,
        }
    }

    /// Hand this to the signal handler; one send shuts every session down.
    pub fn kill_sender(&self) -> broadcast::Sender<()> {
        self.kill.clone()
    }

    /// Opens one session per identity and runs them to completion. A
    /// session that fails to open at startup is fatal; so is a fatal
    /// publish error bubbling out of the handler, which also brings the
    /// other sessions down.
    pub async fn run(&self, identities: Vec<BotIdentity>) -> GatewayResult<()> {
        let mut sessions = JoinSet::new();

        for identity in identities {
            let (connection, events) = self
                .connector
                .open(&identity, Intents::gateway_fanin())
                .await?;
            info!(bot_id = %identity.bot_id, "connected bot to the platform gateway");

            let backfill = Arc::new(MemberBackfill::new(
                self.state.clone(),
                self.checker.clone(),
                self.backfill_delay,
            ));
            sessions.spawn(session_task(
                identity.bot_id,
                connection,
                events,
                self.handler.clone(),
                backfill,
                self.kill.subscribe(),
            ));
        }

        let mut result = Ok(());
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(error = %err, "session terminated with a fatal error");
                    let _ = self.kill.send(());
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
                Err(err) => {
                    error!(error = %err, "session task panicked");
                }
            }
        }
        result
    }
}

/// Drives one session: learns the bot user at ready, schedules backfill,
/// and feeds the handler synchronously so per-session ordering holds.
async fn session_task(
    bot_id: String,
    connection: Arc<dyn PlatformConnection>,
    mut events: mpsc::Receiver<DispatchEvent>,
    handler: Arc<EventHandler>,
    backfill: Arc<MemberBackfill>,
    mut kill: broadcast::Receiver<()>,
) -> GatewayResult<()> {
    let mut bot_user_id: Option<String> = None;

    loop {
        tokio::select! {
            _ = kill.recv() => {
                if let Err(err) = connection.close().await {
                    error!(error = %err, bot_id = %bot_id, "unable to close session");
                }
                return Ok(());
            }
            received = events.recv() => {
                let Some(dispatch) = received else {
                    // Session driver is gone; nothing more will arrive.
                    return Ok(());
                };

                if let DispatchEvent::Ready(ready) = &dispatch {
                    info!(
                        bot_id = %bot_id,
                        bot_user_id = %ready.user.id,
                        guilds = ready.guilds.len(),
                        "session is ready"
                    );
                    bot_user_id = Some(ready.user.id.clone());

                    let backfill = backfill.clone();
                    let connection = connection.clone();
                    let user_id = ready.user.id.clone();
                    tokio::spawn(async move {
                        backfill.run(connection.as_ref(), &user_id).await;
                    });
                }

                handler
                    .on_platform_event(bot_user_id.as_deref(), &dispatch)
                    .await
                    .map_err(GatewayError::Publish)?;
            }
        }
    }
}
