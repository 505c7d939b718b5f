use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
