//! Last-sync tracking for physical screens

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Most recent check-in of one display client
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    pub screen_id: String,
    /// Unix timestamp (milliseconds)
    pub last_sync: i64,
}

/// In-memory heartbeat table; not persisted across restarts
#[derive(Debug, Default)]
pub struct HeartbeatBoard {
    beats: Mutex<HashMap<String, i64>>,
}

impl HeartbeatBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, screen_id: &str, at: i64) {
        let mut beats = self.beats.lock().unwrap();
        let entry = beats.entry(screen_id.to_string()).or_insert(at);
        // clients may report out of order
        *entry = (*entry).max(at);
    }

    /// All heartbeats, sorted by screen id
    pub fn all(&self) -> Vec<Heartbeat> {
        let beats = self.beats.lock().unwrap();
        let mut out: Vec<Heartbeat> = beats
            .iter()
            .map(|(screen_id, last_sync)| Heartbeat {
                screen_id: screen_id.clone(),
                last_sync: *last_sync,
            })
            .collect();
        out.sort_by(|a, b| a.screen_id.cmp(&b.screen_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_latest() {
        let board = HeartbeatBoard::new();
        board.record("right", 10);
        board.record("left", 20);
        board.record("right", 30);
        board.record("right", 25);

        assert_eq!(
            board.all(),
            vec![
                Heartbeat { screen_id: "left".into(), last_sync: 20 },
                Heartbeat { screen_id: "right".into(), last_sync: 30 },
            ]
        );
    }
}
