// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// Received on gateway init and starts the heartbeat;
///
/// See <https://discord.com/developers/docs/topics/gateway-events#hello>
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HelloData {
    /// How often the client should send heartbeats, in milliseconds
    pub heartbeat_interval: u64,
}
