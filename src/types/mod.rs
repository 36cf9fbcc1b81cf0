// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! All the types used by the gateway: platform entities and the gateway
//! event payloads built from them.

pub use entities::*;
pub use events::*;

pub mod entities;
pub mod events;
