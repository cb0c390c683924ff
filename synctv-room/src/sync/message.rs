use async_trait::async_trait;
use bytes::Bytes;
use synctv_room_proto::{ElementMessage, ProtoCodec};

use crate::Result;

/// Outbound message delivered to a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Encoded `ElementMessage`; encoded once per broadcast, shared by all
    /// mailboxes
    Binary(Bytes),
    /// Protocol-level keepalive
    Ping,
}

impl Message {
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Binary(_) => "element",
            Self::Ping => "ping",
        }
    }
}

impl From<&ElementMessage> for Message {
    fn from(msg: &ElementMessage) -> Self {
        Self::Binary(ProtoCodec::encode_element_message(msg))
    }
}

impl From<ElementMessage> for Message {
    fn from(msg: ElementMessage) -> Self {
        Self::from(&msg)
    }
}

/// Duplex transport a front end hands to the hub (WebSocket, gRPC stream).
///
/// Only the outbound half is driven by the room; inbound frames are read by
/// the front end.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one message. Errors end the connection.
    async fn send(&mut self, message: Message) -> Result<()>;

    /// Close the underlying stream. Called once, after the last send.
    async fn close(&mut self) -> Result<()>;
}
