// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::session::GATEWAY_HEARTBEAT;

/// See <https://discord.com/developers/docs/topics/gateway-events#heartbeat>
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayHeartbeat {
    pub op: u8,
    /// The last sequence number we observed
    pub d: Option<u64>,
}

impl Default for GatewayHeartbeat {
    fn default() -> Self {
        Self {
            op: GATEWAY_HEARTBEAT,
            d: None,
        }
    }
}
