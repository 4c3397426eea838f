//! Display state and playlist rotation
//!
//! `DisplayContext` owns playlists, the display lock, the selected playlist and
//! screen heartbeats. `PlaylistRotator` answers "what should be on screen now"
//! from that state and a wall-clock instant.

mod context;
mod heartbeat;
mod rotator;

pub use context::{DisplayContext, DisplayState};
pub use heartbeat::{Heartbeat, HeartbeatBoard};
pub use rotator::{rotation_index, PlaylistRotator};
