//! SyncTV room protocol definitions
//!
//! Protobuf messages pushed from a room to its connected viewers. The
//! generated code is checked in next to `proto/room.proto`.

use bytes::Bytes;
use prost::Message;

pub mod room {
    #[allow(clippy::all)]
    #[allow(warnings)]
    include!("synctv_room.rs");
}

pub use room::{ElementMessage, ElementMessageType, MovieStatus};

impl ElementMessage {
    /// Create a message of the given type.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`ElementMessageType::Unknown`]. An untyped
    /// notification is a programming error, never a runtime input.
    #[must_use]
    pub fn new(kind: ElementMessageType) -> Self {
        assert!(
            kind != ElementMessageType::Unknown,
            "element message constructed without a type"
        );
        Self {
            r#type: kind as i32,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: MovieStatus) -> Self {
        self.movie_status = Some(status);
        self
    }

    #[must_use]
    pub const fn with_time(mut self, unix_millis: i64) -> Self {
        self.time = unix_millis;
        self
    }

    #[must_use]
    pub const fn with_people_num(mut self, people_num: i64) -> Self {
        self.people_num = people_num;
        self
    }

    #[must_use]
    pub const fn with_movie_id(mut self, movie_id: u64) -> Self {
        self.movie_id = movie_id;
        self
    }

    /// Decoded message type, `Unknown` for values this build does not know.
    #[must_use]
    pub fn kind(&self) -> ElementMessageType {
        ElementMessageType::try_from(self.r#type).unwrap_or(ElementMessageType::Unknown)
    }
}

/// Binary codec for room messages
pub struct ProtoCodec;

impl ProtoCodec {
    /// Encode an `ElementMessage` to binary
    #[must_use]
    pub fn encode_element_message(msg: &ElementMessage) -> Bytes {
        Bytes::from(msg.encode_to_vec())
    }

    /// Decode an `ElementMessage` from binary
    pub fn decode_element_message(data: &[u8]) -> Result<ElementMessage, String> {
        ElementMessage::decode(data).map_err(|e| format!("Failed to decode message: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_element_message() {
        let msg = ElementMessage::new(ElementMessageType::Play)
            .with_sender("alice")
            .with_status(MovieStatus {
                playing: true,
                seek: 12.5,
                rate: 1.25,
            })
            .with_time(1_700_000_000_000);

        let bytes = ProtoCodec::encode_element_message(&msg);
        let decoded = ProtoCodec::decode_element_message(&bytes).unwrap();

        assert_eq!(decoded.kind(), ElementMessageType::Play);
        assert_eq!(decoded.sender, "alice");
        assert_eq!(decoded.movie_status.unwrap().seek, 12.5);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ProtoCodec::decode_element_message(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_unknown_wire_type_maps_to_unknown() {
        let msg = ElementMessage {
            r#type: 999,
            ..Default::default()
        };
        assert_eq!(msg.kind(), ElementMessageType::Unknown);
    }

    #[test]
    #[should_panic(expected = "without a type")]
    fn test_untyped_message_panics() {
        let _ = ElementMessage::new(ElementMessageType::Unknown);
    }

    #[test]
    fn test_str_names() {
        assert_eq!(
            ElementMessageType::MoviesChanged.as_str_name(),
            "MOVIES_CHANGED"
        );
        assert_eq!(
            ElementMessageType::from_str_name("PEOPLE_CHANGED"),
            Some(ElementMessageType::PeopleChanged)
        );
    }
}
