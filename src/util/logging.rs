//! # Frame Logging Utilities
//!
//! Rate-limited logging and hex dumps for ECHONET Lite traffic.
//!
//! ```rust
//! use echonet_audit::util::logging::{LogThrottle, log_frame_hex};
//!
//! let mut throttle = LogThrottle::new(1000, 5); // 5 messages per second
//! if throttle.allow() {
//!     log::warn!("datagram from unexpected peer");
//! }
//! log_frame_hex("sent", &[0x10, 0x81, 0x00, 0x01]);
//! ```

use crate::echonet::frame::Frame;
use std::time::Instant;

/// Target used for per-frame traffic logs.
pub const FRAME_LOG_TARGET: &str = "echonet_audit::frame";

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    count: u32,
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    ///
    /// # Arguments
    /// * `window_ms` - Time window in milliseconds
    /// * `cap` - Maximum messages allowed per window
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Returns `true` if the message should be logged, `false` if it
    /// should be throttled. The counter resets once the window expires.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        self.count <= self.cap
    }

    /// Reset the throttle (start new window immediately)
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
    }
}

/// Log frame bytes in hex at debug level, truncated to keep lines short.
pub fn log_frame_hex(prefix: &str, data: &[u8]) {
    const MAX_LOG_BYTES: usize = 64;

    let shown = &data[..data.len().min(MAX_LOG_BYTES)];
    let hex_str = crate::util::hex::format_hex_compact(shown);
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    log::debug!(target: FRAME_LOG_TARGET, "{prefix}: {hex_str}{suffix}");
}

/// Log the header fields of a frame on one line at debug level.
pub fn log_frame_summary(prefix: &str, frame: &Frame) {
    log::debug!(
        target: FRAME_LOG_TARGET,
        "{}: TID=0x{:04X} SEOJ={} DEOJ={} ESV=0x{:02X}({}) OPC={} EPCs=[{}]",
        prefix,
        frame.transaction_id,
        frame.source,
        frame.destination,
        frame.service,
        crate::constants::service_name(frame.service),
        frame.operation_count,
        frame
            .properties
            .iter()
            .map(|p| format!("0x{:02X}", p.epc))
            .collect::<Vec<_>>()
            .join(",")
    );
}

/// Log a warning with throttling
#[macro_export]
macro_rules! log_warn_throttled {
    ($throttle:expr, $($arg:tt)*) => {
        if $throttle.allow() {
            log::warn!($($arg)*);
        }
    };
}
