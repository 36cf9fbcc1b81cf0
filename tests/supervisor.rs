// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Supervisor lifecycle over scripted sessions.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cacophony_gateway::errors::SessionError;
use cacophony_gateway::session::{
    BotIdentity, PlatformConnection, PlatformConnector, Supervisor,
};
use cacophony_gateway::types::{
    DispatchEvent, GatewayReady, Intents, UnavailableGuild, User,
};

use common::{guild_create, setup, RecordingConnection};

fn ready(bot_user_id: &str, guild_ids: &[&str]) -> DispatchEvent {
    DispatchEvent::Ready(GatewayReady {
        version: 6,
        user: User {
            id: bot_user_id.to_string(),
            username: format!("bot-{bot_user_id}"),
            ..Default::default()
        },
        session_id: "s1".to_string(),
        guilds: guild_ids
            .iter()
            .map(|id| UnavailableGuild {
                id: id.to_string(),
                unavailable: Some(true),
            })
            .collect(),
    })
}

/// Scripted connector: each open() hands out a pre-loaded dispatch stream
/// and a recording connection.
struct ScriptedConnector {
    scripts: Mutex<Vec<Vec<DispatchEvent>>>,
    connections: Mutex<Vec<Arc<RecordingConnection>>>,
    /// Held senders keep sessions open until the supervisor kills them.
    open_senders: Mutex<Vec<mpsc::Sender<DispatchEvent>>>,
    hold_open: bool,
}

impl ScriptedConnector {
    fn new(scripts: Vec<Vec<DispatchEvent>>, hold_open: bool) -> ScriptedConnector {
        ScriptedConnector {
            scripts: Mutex::new(scripts),
            connections: Mutex::new(Vec::new()),
            open_senders: Mutex::new(Vec::new()),
            hold_open,
        }
    }

    fn connections(&self) -> Vec<Arc<RecordingConnection>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformConnector for ScriptedConnector {
    async fn open(
        &self,
        _identity: &BotIdentity,
        _intents: Intents,
    ) -> Result<(Arc<dyn PlatformConnection>, mpsc::Receiver<DispatchEvent>), SessionError> {
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                return Err(SessionError::Connect("no script left".to_string()));
            }
            scripts.remove(0)
        };

        let (sender, receiver) = mpsc::channel(64);
        for event in script {
            sender.send(event).await.expect("script channel full");
        }
        if self.hold_open {
            self.open_senders.lock().unwrap().push(sender);
        }

        let connection = Arc::new(RecordingConnection::new());
        self.connections.lock().unwrap().push(connection.clone());
        Ok((connection, receiver))
    }
}

/// Events flow: ready supplies the identity, later dispatches reach the
/// pipeline attributed to it; the session ends when its stream closes.
#[tokio::test]
async fn test_supervisor_drives_session_to_completion() {
    let bundle = setup(false, false).await;
    let connector = Arc::new(ScriptedConnector::new(
        vec![vec![ready("B1", &["100"]), guild_create("100", "A")]],
        false,
    ));

    let supervisor = Supervisor::new(
        connector.clone(),
        bundle.handler.clone(),
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::from_secs(3600),
    );

    supervisor
        .run(vec![BotIdentity {
            bot_id: "B1".to_string(),
            token: "t1".to_string(),
        }])
        .await
        .unwrap();

    let messages = bundle.publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].routing_key, "cacophony.discord.guild_create");
    assert_eq!(messages[0].body_json()["botUserId"], "B1");
    assert_eq!(
        bundle.state.bot_for_guild("100").await.unwrap().unwrap(),
        "B1"
    );
}

/// Events delivered before ready have no identity and are dropped.
#[tokio::test]
async fn test_events_before_ready_are_dropped() {
    let bundle = setup(false, false).await;
    let connector = Arc::new(ScriptedConnector::new(
        vec![vec![guild_create("100", "A"), ready("B1", &[])]],
        false,
    ));

    let supervisor = Supervisor::new(
        connector,
        bundle.handler.clone(),
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::from_secs(3600),
    );

    supervisor
        .run(vec![BotIdentity {
            bot_id: "B1".to_string(),
            token: "t1".to_string(),
        }])
        .await
        .unwrap();

    assert!(bundle.publisher.messages().is_empty());
    assert!(bundle.state.guild("100").await.unwrap().is_none());
}

/// The shutdown fan-out closes every session.
#[tokio::test]
async fn test_shutdown_closes_all_sessions() {
    let bundle = setup(false, false).await;
    let connector = Arc::new(ScriptedConnector::new(
        vec![vec![ready("B1", &[])], vec![ready("B2", &[])]],
        true,
    ));

    let supervisor = Supervisor::new(
        connector.clone(),
        bundle.handler.clone(),
        bundle.state.clone(),
        bundle.checker.clone(),
        Duration::from_secs(3600),
    );
    let kill = supervisor.kill_sender();

    let identities = vec![
        BotIdentity {
            bot_id: "B1".to_string(),
            token: "t1".to_string(),
        },
        BotIdentity {
            bot_id: "B2".to_string(),
            token: "t2".to_string(),
        },
    ];

    let run = tokio::spawn(async move { supervisor.run(identities).await });

    // Let the sessions drain their scripts, then pull the plug.
    tokio::time::sleep(Duration::from_millis(50)).await;
    kill.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("supervisor did not stop in time")
        .unwrap()
        .unwrap();

    let connections = connector.connections();
    assert_eq!(connections.len(), 2);
    for connection in connections {
        assert!(connection.is_closed());
    }
}
