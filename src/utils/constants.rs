//! Shared constants and invariants

pub const DEFAULT_CONFIG_PATH: &str = "fcm-agent.yaml";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

// Token cache
pub const DEFAULT_REFRESH_BUFFER_MINUTES: u64 = 5;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
