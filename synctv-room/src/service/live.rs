//! Live-stream relay seam
//!
//! Rooms never touch stream bytes. They only ask the relay to open or tear
//! down the channel addressed by a movie's pull key, and to drop a room's
//! whole namespace when the room goes away.

use crate::models::RoomId;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
pub trait LiveChannels: Send + Sync {
    /// Open the ingest/playback channel for `pull_key`.
    fn create_channel(&self, room_id: &RoomId, pull_key: &str) -> Result<()>;

    /// Tear down the channel for `pull_key`, kicking any publisher.
    fn delete_channel(&self, room_id: &RoomId, pull_key: &str) -> Result<()>;

    /// Drop every channel belonging to `room_id`.
    fn release_room(&self, room_id: &RoomId);
}

/// Relay used when live streaming is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveChannels;

impl LiveChannels for NoopLiveChannels {
    fn create_channel(&self, _room_id: &RoomId, _pull_key: &str) -> Result<()> {
        Ok(())
    }

    fn delete_channel(&self, _room_id: &RoomId, _pull_key: &str) -> Result<()> {
        Ok(())
    }

    fn release_room(&self, _room_id: &RoomId) {}
}
