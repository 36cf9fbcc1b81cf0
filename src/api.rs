// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The status surface: `GET /stats` reporting service information and the
//! event counters.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::metrics::{EventCounters, EventCountersSnapshot};

/// Everything `/stats` reports, assembled at startup.
pub struct AppStatus {
    service_name: &'static str,
    environment: String,
    hash: String,
    cluster_environment: String,
    launched_at: DateTime<Utc>,
    counters: Arc<EventCounters>,
}

#[derive(Debug, Serialize)]
struct ServiceInformation {
    name: &'static str,
    environment: String,
    hash: String,
    cluster_environment: String,
    launched_at: DateTime<Utc>,
    uptime_seconds: i64,
}

#[derive(Serialize)]
struct StatsResponse {
    service: ServiceInformation,
    events: EventCountersSnapshot,
    available: bool,
}

impl AppStatus {
    pub fn new(
        service_name: &'static str,
        config: &Config,
        counters: Arc<EventCounters>,
    ) -> AppStatus {
        AppStatus {
            service_name,
            environment: config.environment.as_str().to_string(),
            hash: config.hash.clone(),
            cluster_environment: config.cluster_environment.clone(),
            launched_at: Utc::now(),
            counters,
        }
    }

    fn service_information(&self) -> ServiceInformation {
        let now = Utc::now();
        ServiceInformation {
            name: self.service_name,
            environment: self.environment.clone(),
            hash: self.hash.clone(),
            cluster_environment: self.cluster_environment.clone(),
            launched_at: self.launched_at,
            uptime_seconds: (now - self.launched_at).num_seconds(),
        }
    }
}

pub fn router(status: Arc<AppStatus>) -> Router {
    Router::new().route("/stats", get(get_stats)).with_state(status)
}

/// Binds the status listener and serves until the process ends.
pub async fn serve(status: Arc<AppStatus>, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, router(status)).await
}

async fn get_stats(State(status): State<Arc<AppStatus>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        service: status.service_information(),
        events: status.counters.snapshot(),
        available: true,
    })
}
