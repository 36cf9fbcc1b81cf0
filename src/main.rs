// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cacophony_gateway::api::{self, AppStatus};
use cacophony_gateway::config::{Config, Environment};
use cacophony_gateway::dedup::Deduplicator;
use cacophony_gateway::errortrack::LogSink;
use cacophony_gateway::handler::EventHandler;
use cacophony_gateway::kv::{KeyValueStore, RedisStore};
use cacophony_gateway::metrics::EventCounters;
use cacophony_gateway::publisher::AmqpPublisher;
use cacophony_gateway::session::{BotIdentity, Supervisor, TungsteniteConnector, SHUTDOWN_GRACE};
use cacophony_gateway::state::SharedState;
use cacophony_gateway::whitelist::Checker;

/// The name of the service
const SERVICE_NAME: &str = "gateway";
/// The topic exchange every event is published on
const EXCHANGE_NAME: &str = "cacophony";
const WHITELIST_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("unable to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    let kv: Arc<dyn KeyValueStore> =
        match RedisStore::connect(&config.redis_address, &config.redis_password).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                error!(error = %err, "unable to initialise redis client");
                std::process::exit(1);
            }
        };

    let publisher = match AmqpPublisher::connect(&config.amqp_dsn, EXCHANGE_NAME).await {
        Ok(publisher) => Arc::new(publisher),
        Err(err) => {
            error!(error = %err, "unable to initialise AMQP session");
            std::process::exit(1);
        }
    };

    let checker = Checker::new(
        kv.clone(),
        WHITELIST_REFRESH_INTERVAL,
        config.enable_whitelist,
    );
    if let Err(err) = checker.start().await {
        error!(error = %err, "unable to initialise whitelist checker");
        std::process::exit(1);
    }

    let state = SharedState::new(kv.clone());
    let counters = Arc::new(EventCounters::new());

    let handler = Arc::new(EventHandler::new(
        state.clone(),
        checker.clone(),
        Deduplicator::new(kv),
        publisher,
        counters.clone(),
        Arc::new(LogSink),
        config.deduplicate,
        config.event_ttl,
    ));

    let supervisor = Supervisor::new(
        Arc::new(TungsteniteConnector::new()),
        handler,
        state,
        checker,
        config.request_members_delay,
    );

    let status = Arc::new(AppStatus::new(SERVICE_NAME, &config, counters));
    let port = config.port;
    tokio::spawn(async move {
        if let Err(err) = api::serve(status, port).await {
            error!(error = %err, "status endpoint failed");
        }
    });

    let kill = supervisor.kill_sender();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("received shutdown signal, closing sessions");
        let _ = kill.send(());

        tokio::time::sleep(SHUTDOWN_GRACE).await;
        warn!("sessions did not close within the grace period, forcing exit");
        std::process::exit(1);
    });

    let identities: Vec<BotIdentity> = config
        .discord_tokens
        .iter()
        .map(|(bot_id, token)| BotIdentity {
            bot_id: bot_id.clone(),
            token: token.clone(),
        })
        .collect();

    info!(
        sessions = identities.len(),
        environment = config.environment.as_str(),
        "service is running"
    );

    match supervisor.run(identities).await {
        Ok(()) => info!("service stopped"),
        Err(err) => {
            error!(error = %err, "service terminated");
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &Config) {
    let default_level = match config.environment {
        Environment::Development => "debug",
        Environment::Production => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.environment {
        Environment::Development => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        Environment::Production => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!(error = %err, "unable to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
