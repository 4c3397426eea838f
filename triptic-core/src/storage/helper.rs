//! Shared utilities for storage implementations

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current unix timestamp in milliseconds
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Settings key holding the display lock
pub const SETTING_DISPLAY_LOCK: &str = "display_lock";

/// Settings key holding the selected playlist name
pub const SETTING_CURRENT_PLAYLIST: &str = "current_playlist";
