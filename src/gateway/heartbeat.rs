use std::time::Duration;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Transport-level liveness probing.
///
/// With `ping_interval` set, the outbound pump pings the peer on that period
/// and the inbound pump ends the session once nothing (pongs included) has
/// been read for `idle_timeout`. With it unset, only transport errors end a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub ping_interval: Option<Duration>,
    pub idle_timeout: Duration,
}

impl Liveness {
    pub fn disabled() -> Self {
        Self {
            ping_interval: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// `ping_secs == 0` disables probing. The idle timeout is never shorter
    /// than one ping period.
    pub fn from_secs(ping_secs: u64, idle_secs: u64) -> Self {
        if ping_secs == 0 {
            return Self::disabled();
        }
        Self {
            ping_interval: Some(Duration::from_secs(ping_secs)),
            idle_timeout: Duration::from_secs(idle_secs.max(ping_secs)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ping_interval.is_some()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}
