// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::entities::User;

/// See <https://discord.com/developers/docs/resources/webhook#webhook-object>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub id: String,
    #[serde(rename = "type")]
    #[serde(default)]
    pub webhook_type: i32,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user: Option<User>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub token: Option<String>,
}
