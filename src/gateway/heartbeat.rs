use std::time::Duration;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// How long a disconnected session's outbound pump may keep flushing.
pub const WRITER_GRACE: Duration = Duration::from_secs(5);
