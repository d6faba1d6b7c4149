//! RPC configuration.

use std::time::Duration;

use tracing::warn;

/// How long a request waits for its response before failing.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(6000);

/// Configuration for outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcConfig {
    /// Deadline for each outstanding request. Default: 6000 ms.
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl RpcConfig {
    /// Clamps out-of-range values.
    ///
    /// A zero timeout would fail every request before it is even sent, so
    /// it falls back to [`REQUEST_TIMEOUT`].
    pub fn validated(mut self) -> Self {
        if self.request_timeout.is_zero() {
            warn!(
                default_ms = REQUEST_TIMEOUT.as_millis() as u64,
                "request_timeout is zero, using default"
            );
            self.request_timeout = REQUEST_TIMEOUT;
        }
        self
    }
}
