pub mod live;
pub mod password;
pub mod playback;
pub mod playlist;
pub mod registry;
pub mod room;

pub use live::{LiveChannels, NoopLiveChannels};
pub use password::{hash_password, verify_password};
pub use playback::PlaybackState;
pub use playlist::Playlist;
pub use registry::{RoomFilter, RoomRegistry};
pub use room::{Room, RoomBuilder, RoomInfo, RoomRecord};
