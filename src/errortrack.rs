// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Best-effort error capture. The pipeline reports failures here as a side
//! effect; a sink must never block event processing.

use std::error::Error;

use tracing::error;

/// Out-of-band error reporting seam. The SaaS transport lives behind an
/// implementation of this trait; the default sink only logs.
pub trait ErrorSink: Send + Sync {
    fn capture(&self, error: &dyn Error);
}

/// Captures errors into the log stream.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn capture(&self, error: &dyn Error) {
        error!(target: "errortracking", error = %error, "captured error");
    }
}
