// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Member backfill for large guilds: delayed, throttled member requests on
//! the session, for guilds this session's bot owns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info};

use crate::session::PlatformConnection;
use crate::state::SharedState;
use crate::whitelist::Checker;

const REQUEST_SPACING: Duration = Duration::from_secs(5);

/// One-shot per session lifetime; the latch is not reset on reconnect.
pub struct MemberBackfill {
    state: SharedState,
    checker: Checker,
    delay: Duration,
    spacing: Duration,
    started: AtomicBool,
}

impl MemberBackfill {
    pub fn new(state: SharedState, checker: Checker, delay: Duration) -> MemberBackfill {
        MemberBackfill {
            state,
            checker,
            delay,
            spacing: REQUEST_SPACING,
            started: AtomicBool::new(false),
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> MemberBackfill {
        self.spacing = spacing;
        self
    }

    /// Enumerates members of every allowed guild owned by this session's
    /// bot. Subsequent calls (reconnects) return immediately.
    pub async fn run(&self, session: &dyn PlatformConnection, bot_user_id: &str) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        tokio::time::sleep(self.delay).await;

        let candidates = if self.checker.enabled() {
            self.checker.snapshot()
        } else {
            match self.state.all_guild_ids().await {
                Ok(guild_ids) => guild_ids,
                Err(err) => {
                    error!(error = %err, "unable to list guilds for member backfill");
                    return;
                }
            }
        };

        let mut requested = 0usize;
        for guild_id in candidates {
            if self.checker.is_denied(&guild_id) {
                continue;
            }

            // Election: only the owning bot enumerates this guild.
            let owner = match self.state.bot_for_guild(&guild_id).await {
                Ok(Some(owner)) => owner,
                Ok(None) => continue,
                Err(_) => continue,
            };
            if owner != bot_user_id {
                continue;
            }

            if requested > 0 {
                tokio::time::sleep(self.spacing).await;
            }

            info!(guild_id = %guild_id, bot_id = %bot_user_id, "requesting guild members");
            if let Err(err) = session.request_members(&guild_id, "", 0).await {
                error!(
                    error = %err,
                    guild_id = %guild_id,
                    "failure requesting guild members"
                );
            }
            requested += 1;
        }

        info!(count = requested, bot_id = %bot_user_id, "requested members for guilds");
    }
}
