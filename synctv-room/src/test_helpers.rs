//! Test helpers and fixtures for synctv-room tests

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::{BaseMovie, Movie, MovieId, RoomId, User, UserId};
use crate::sync::{Message, Transport};
use crate::{Error, Result, RoomConfig};

/// Transport that forwards every message into an unbounded channel
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::Transport("receiver dropped".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport whose writes never complete, to fill a mailbox
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&mut self, _message: Message) -> Result<()> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport whose writes always fail
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&mut self, _message: Message) -> Result<()> {
        Err(Error::Transport("connection reset".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Room config with the cheapest bcrypt cost, so hashing stays fast
pub fn test_config() -> RoomConfig {
    RoomConfig {
        password_cost: 4,
        ..RoomConfig::default()
    }
}

/// Create a plain user with no password
pub fn test_user(name: &str) -> User {
    User::new(UserId::new(), name.to_string(), String::new(), false, false)
}

/// Create a test room ID
pub fn test_room_id(id: &str) -> RoomId {
    RoomId::parse(id, 32).unwrap()
}

/// Base info for an on-demand movie
pub fn base_movie(name: &str) -> BaseMovie {
    BaseMovie {
        url: format!("https://media.example.com/{name}.mp4"),
        name: name.to_string(),
        media_type: "mp4".to_string(),
        ..BaseMovie::default()
    }
}

/// Base info for a proxied live stream, which gets a pull key
pub fn live_base_movie(name: &str) -> BaseMovie {
    BaseMovie {
        url: format!("https://live.example.com/{name}.m3u8"),
        name: name.to_string(),
        live: true,
        proxy: true,
        media_type: "m3u8".to_string(),
        ..BaseMovie::default()
    }
}

/// Build an on-demand movie with the given id
pub fn movie_fixture(id: u64) -> Movie {
    Movie::new(MovieId(id), base_movie(&format!("movie-{id}")), UserId::from_string("creator".to_string())).unwrap()
}

/// Build a live movie with the given id
pub fn live_movie(id: u64) -> Movie {
    Movie::new(MovieId(id), live_base_movie(&format!("live-{id}")), UserId::from_string("creator".to_string())).unwrap()
}
