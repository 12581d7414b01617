use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_IDLE_TIMEOUT};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_DISPATCH_CAPACITY: usize = 1024;
pub const DEFAULT_WRITE_PACING: Duration = Duration::from_millis(5);

/// Tunables for the session pumps.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Capacity of each session's outbound queue.
    pub queue_capacity: usize,
    /// Delay after every outbound write. Zero disables pacing.
    pub write_pacing: Duration,
    /// Ping interval for the outbound pump. `None` disables pings.
    pub heartbeat_interval: Option<Duration>,
    /// Maximum silence tolerated by the inbound pump. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_pacing: DEFAULT_WRITE_PACING,
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub static_dir: PathBuf,
    pub dispatch_capacity: usize,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let queue_capacity = env_parse::<usize>("COEDIT_QUEUE_CAPACITY")
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let dispatch_capacity = env_parse::<usize>("COEDIT_DISPATCH_CAPACITY")
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_DISPATCH_CAPACITY);

        let write_pacing = env_parse::<u64>("COEDIT_WRITE_PACING_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WRITE_PACING);

        let heartbeat_interval = match env_parse::<u64>("COEDIT_HEARTBEAT_INTERVAL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_HEARTBEAT_INTERVAL),
        };

        let idle_timeout = match env_parse::<u64>("COEDIT_IDLE_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_IDLE_TIMEOUT),
        };

        let static_dir = std::env::var("COEDIT_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./static"));

        Self {
            port: env_parse("PORT").unwrap_or(DEFAULT_PORT),
            static_dir,
            dispatch_capacity,
            session: SessionConfig {
                queue_capacity,
                write_pacing,
                heartbeat_interval,
                idle_timeout,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
