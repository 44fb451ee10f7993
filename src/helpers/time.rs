use chrono::{SecondsFormat, Utc};

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

/// Current UTC time, e.g. `2024-05-01T10:00:00.000Z`
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
