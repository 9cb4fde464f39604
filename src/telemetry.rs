//! Telemetry utilities for command timing and tracing spans.

use std::time::Instant;

/// Guard for timing command dispatch and recording metrics.
///
/// Records latency when dropped.
pub struct CommandTimer {
    transport: &'static str,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(transport: &'static str) -> Self {
        Self {
            transport,
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(self.transport, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one realtime connection.
    pub fn connection(conn: &str, peer: &str) -> Span {
        info_span!("connection", conn = %conn, peer = %peer)
    }

    /// Span for one console session.
    pub fn console(name: &str) -> Span {
        info_span!("console", server = %name)
    }
}
