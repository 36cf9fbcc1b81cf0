// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::entities::User;

/// See <https://discord.com/developers/docs/resources/invite#invite-object>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Invite {
    pub code: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub inviter: Option<User>,
    #[serde(default)]
    pub uses: i32,
    #[serde(default)]
    pub max_uses: i32,
    pub max_age: Option<i32>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub revoked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// Structural equality for invite list comparison: an invite changed
    /// when its code or revocation changed. A moving use count alone does
    /// not count as a structural change.
    pub fn same_shape(&self, other: &Invite) -> bool {
        self.code == other.code && self.revoked == other.revoked
    }
}
