//! Node configuration structures
//!
//! Every bounded wait and threshold the node uses lives here, with the
//! reference values as `Default`.

use crate::time::FixedZone;

/// PM sensor frame decoder configuration
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Buffered byte count above which stale input is discarded before a read
    pub drain_threshold: usize,
    /// Sync word search deadline in milliseconds
    pub sync_timeout_ms: u64,
    /// Timeout for reading the frame body once synced
    pub body_timeout_ms: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            drain_threshold: 200,
            sync_timeout_ms: 3000,
            body_timeout_ms: 1500,
        }
    }
}

/// Gas sensor watchdog configuration
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Consecutive failures that trigger a sensor reset
    pub failure_threshold: u8,
    /// Pause between stopping measurement and the reinit command
    pub stop_settle_ms: u32,
    /// Pause between the reinit command and restarting measurement
    pub reinit_settle_ms: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            stop_settle_ms: 200,
            reinit_settle_ms: 1000,
        }
    }
}

/// Wall-clock acquisition configuration
#[derive(Debug, Clone)]
pub struct TimeConfig {
    /// Network time servers, in priority order
    pub servers: &'static [&'static str],
    /// Local time rule (fixed offset, no DST)
    pub zone: FixedZone,
    /// Network time polls before falling back
    pub sync_poll_attempts: u8,
    /// Spacing between network time polls
    pub sync_poll_interval_ms: u32,
    /// Host queried for a `Date:` header when network time is unavailable
    pub fallback_host: &'static str,
    /// HTTPS port of the fallback host
    pub fallback_port: u16,
    /// Request path on the fallback host
    pub fallback_path: &'static str,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.google.com", "time.cloudflare.com"],
            zone: FixedZone::COLOMBIA,
            sync_poll_attempts: 20,
            sync_poll_interval_ms: 500,
            fallback_host: "clients3.google.com",
            fallback_port: 443,
            fallback_path: "/generate_204",
        }
    }
}

/// Sampling cycle configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Minimum monotonic time between cycle starts
    pub cycle_interval_ms: u64,
    /// Consecutive failed uploads that trigger a restart
    pub upload_failure_limit: u8,
    /// Grace period before a requested restart
    pub restart_delay_ms: u32,
    pub frame: FrameConfig,
    pub watchdog: WatchdogConfig,
    pub time: TimeConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5 * 60 * 1000,
            upload_failure_limit: 6,
            restart_delay_ms: 1000,
            frame: FrameConfig::default(),
            watchdog: WatchdogConfig::default(),
            time: TimeConfig::default(),
        }
    }
}
