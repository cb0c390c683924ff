//! SyncTV room subsystem
//!
//! Rooms keep a shared playlist and playback clock in sync across viewers.
//! Every state change is published through a per-room hub that fans out to
//! each connected viewer in order, dropping viewers that cannot keep up.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;
pub mod sync;

#[cfg(test)]
pub mod test_helpers;

pub use config::{Config, LoggingConfig, RoomConfig};
pub use error::{Error, ErrorKind, Result};
pub use service::{
    LiveChannels, NoopLiveChannels, Room, RoomBuilder, RoomFilter, RoomInfo, RoomRecord, RoomRegistry,
};
pub use sync::{BroadcastOptions, ClientConnection, Message, Transport};
