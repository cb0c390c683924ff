// Module: sync

pub mod client;
pub mod hub;
pub mod message;

pub use client::{ClientConnection, ConnectionId};
pub use hub::{BroadcastOptions, Hub};
pub use message::{Message, Transport};
