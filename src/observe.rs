// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-event tracing. Every event processed roots a new trace; the carrier
//! injected into the event is an opaque header map whose format belongs to
//! the consumer's propagator.

use std::collections::HashMap;

use rand::RngCore;
use tracing::{info_span, Span};

use crate::event::Event;

/// W3C-style `traceparent` carrier for a fresh root span.
pub fn new_carrier() -> HashMap<String, String> {
    let mut rng = rand::thread_rng();

    let mut trace_id = [0u8; 16];
    rng.fill_bytes(&mut trace_id);
    let mut span_id = [0u8; 8];
    rng.fill_bytes(&mut span_id);

    let mut carrier = HashMap::new();
    carrier.insert(
        "traceparent".to_string(),
        format!("00-{}-{}-01", hex::encode(trace_id), hex::encode(span_id)),
    );
    carrier
}

/// The span wrapping one event's trip through the pipeline, stamped with
/// the event's ids.
pub fn event_span(event: &Event) -> Span {
    info_span!(
        "handle_event",
        event.id = %event.id,
        event.kind = event.kind.as_str(),
        event.guild_id = event.guild_id.as_deref().unwrap_or(""),
        event.bot_user_id = %event.bot_user_id,
    )
}
