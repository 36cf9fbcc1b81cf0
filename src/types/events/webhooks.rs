// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// See <https://discord.com/developers/docs/topics/gateway-events#webhooks-update>
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct WebhooksUpdate {
    pub guild_id: String,
    pub channel_id: String,
}
