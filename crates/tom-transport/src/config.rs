use std::time::Duration;

use crate::TomTransportError;

/// Configuration for a [`TomNode`](crate::TomNode).
///
/// All fields have defaults. Use the builder pattern:
///
/// ```rust
/// use std::time::Duration;
/// use tom_transport::TomNodeConfig;
///
/// let config = TomNodeConfig::new()
///     .send_attempts(5)
///     .retry_backoff(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone)]
pub struct TomNodeConfig {
    /// Maximum frame size in bytes, both directions.
    pub(crate) max_message_size: usize,
    /// Channel buffer size for inbound frames.
    pub(crate) recv_buffer: usize,
    /// Timeout for establishing an outbound connection.
    pub(crate) connect_timeout: Duration,
    /// Timeout for reading / writing one frame.
    pub(crate) io_timeout: Duration,
    /// Attempts per outbound frame before it is dropped.
    pub(crate) send_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * retry_backoff` before the next one.
    pub(crate) retry_backoff: Duration,
    /// Frames queued per peer lane before `send_raw` reports the lane full.
    pub(crate) lane_capacity: usize,
    /// Inbound connections handled concurrently.
    pub(crate) max_inbound: usize,
}

impl Default for TomNodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TomNodeConfig {
    pub fn new() -> Self {
        Self {
            max_message_size: 64 * 1024,
            recv_buffer: 1024,
            connect_timeout: Duration::from_millis(800),
            io_timeout: Duration::from_secs(2),
            send_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            lane_capacity: 1024,
            max_inbound: 256,
        }
    }

    /// Set maximum frame size (default: 64 KiB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the inbound channel capacity (default: 1024).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity;
        self
    }

    /// Set the connect timeout (default: 800 ms).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-frame I/O timeout (default: 2 s).
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the number of attempts per outbound frame (default: 3).
    pub fn send_attempts(mut self, attempts: u32) -> Self {
        self.send_attempts = attempts;
        self
    }

    /// Set the linear backoff unit (default: 50 ms).
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the per-peer outbound queue capacity (default: 1024).
    pub fn lane_capacity(mut self, capacity: usize) -> Self {
        self.lane_capacity = capacity;
        self
    }

    /// Set the number of concurrently handled inbound connections (default: 256).
    pub fn max_inbound(mut self, handlers: usize) -> Self {
        self.max_inbound = handlers;
        self
    }

    pub fn validate(&self) -> Result<(), TomTransportError> {
        if self.send_attempts == 0 {
            return Err(TomTransportError::Config("send_attempts must be at least 1".into()));
        }
        if self.max_message_size == 0 {
            return Err(TomTransportError::Config("max_message_size must be positive".into()));
        }
        if self.max_message_size > u32::MAX as usize {
            return Err(TomTransportError::Config(
                "max_message_size must fit a 32-bit length prefix".into(),
            ));
        }
        if self.recv_buffer == 0 || self.lane_capacity == 0 || self.max_inbound == 0 {
            return Err(TomTransportError::Config(
                "recv_buffer, lane_capacity and max_inbound must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based).
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}
