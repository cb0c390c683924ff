use serde::{Deserialize, Serialize};
use synctv_room_proto::MovieStatus;

use super::movie::MovieInfo;

/// Extrapolated playback position as seen by a viewer right now
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Playback position in seconds
    pub seek: f64,
    /// 0.5, 1.0, 1.5, 2.0, etc.
    pub rate: f64,
    pub playing: bool,
}

impl Status {
    /// Pinned status reported for live streams.
    pub const LIVE: Self = Self {
        seek: 0.0,
        rate: 1.0,
        playing: true,
    };
}

impl Default for Status {
    fn default() -> Self {
        Self {
            seek: 0.0,
            rate: 1.0,
            playing: false,
        }
    }
}

impl From<Status> for MovieStatus {
    fn from(status: Status) -> Self {
        Self {
            playing: status.playing,
            seek: status.seek,
            rate: status.rate,
        }
    }
}

/// Current movie plus its status, for API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentInfo {
    pub movie: Option<MovieInfo>,
    pub status: Status,
}
