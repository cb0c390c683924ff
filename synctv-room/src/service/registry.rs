//! Room registry
//!
//! Owns every live room keyed by id and drives room lifecycle. Passed down
//! explicitly; there is no global instance.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::live::LiveChannels;
use super::room::{Room, RoomBuilder, RoomInfo};
use crate::config::RoomConfig;
use crate::{Error, Result};

/// Which rooms a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomFilter {
    #[default]
    All,
    Hidden,
    Visible,
}

impl RoomFilter {
    const fn matches(self, hidden: bool) -> bool {
        match self {
            Self::All => true,
            Self::Hidden => hidden,
            Self::Visible => !hidden,
        }
    }
}

pub struct RoomRegistry {
    config: Arc<RoomConfig>,
    live: Arc<dyn LiveChannels>,
    rooms: DashMap<String, Arc<Room>>,
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("config", &self.config)
            .field("rooms", &self.rooms.len())
            .finish_non_exhaustive()
    }
}

impl RoomRegistry {
    pub fn new(config: RoomConfig, live: Arc<dyn LiveChannels>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            live,
            rooms: DashMap::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<RoomConfig> {
        &self.config
    }

    /// Build and store a new room. Fails `AlreadyExists` when the id is
    /// taken, including when another caller wins a race for it.
    pub async fn create_room(&self, builder: RoomBuilder) -> Result<Arc<Room>> {
        let id = builder.room_id(&self.config)?;
        if self.rooms.contains_key(id.as_str()) {
            return Err(Error::AlreadyExists(format!("room {id}")));
        }

        let room = Arc::new(
            builder
                .build(Arc::clone(&self.config), Arc::clone(&self.live))
                .await?,
        );
        let stored = match self.rooms.entry(id.as_str().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&room));
                true
            }
        };

        if !stored {
            // lost the race; stop the hub we just started
            if let Err(e) = room.close().await {
                warn!(room_id = %id, error = %e, "Failed to close discarded room");
            }
            return Err(Error::AlreadyExists(format!("room {id}")));
        }

        info!(room_id = %id, rooms = self.rooms.len(), "Room created");
        Ok(room)
    }

    /// Store a room built elsewhere, e.g. restored from storage.
    pub fn load_room(&self, room: Room) -> Result<Arc<Room>> {
        match self.rooms.entry(room.id().as_str().to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("room {}", room.id()))),
            Entry::Vacant(entry) => {
                let room = Arc::new(room);
                entry.insert(Arc::clone(&room));
                Ok(room)
            }
        }
    }

    pub fn get_room(&self, id: &str) -> Result<Arc<Room>> {
        self.rooms
            .get(id)
            .map(|room| Arc::clone(room.value()))
            .ok_or_else(|| Error::NotFound(format!("room {id}")))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Remove a room, close it and release its live-stream namespace.
    pub async fn del_room(&self, id: &str) -> Result<()> {
        let (_, room) = self
            .rooms
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("room {id}")))?;

        let result = room.close().await;
        self.live.release_room(room.id());
        info!(room_id = %id, rooms = self.rooms.len(), "Room deleted");
        result
    }

    /// Summaries of the rooms passing `filter`, oldest first.
    #[must_use]
    pub fn list_rooms(&self, filter: RoomFilter) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .iter()
            .filter(|entry| filter.matches(entry.value().is_hidden()))
            .map(|entry| entry.value().info())
            .collect();
        rooms.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        rooms
    }

    /// Close every room for shutdown. Rooms are removed first so no new
    /// work reaches them.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        let rooms: Vec<Arc<Room>> = ids
            .iter()
            .filter_map(|id| self.rooms.remove(id).map(|(_, room)| room))
            .collect();

        let count = rooms.len();
        let results = futures::future::join_all(rooms.iter().map(|room| async move {
            let result = room.close().await;
            self.live.release_room(room.id());
            (room.id().clone(), result)
        }))
        .await;

        for (id, result) in results {
            if let Err(e) = result {
                warn!(room_id = %id, error = %e, "Failed to close room during shutdown");
            }
        }
        info!(rooms = count, "All rooms closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::live::{MockLiveChannels, NoopLiveChannels};
    use crate::sync::{BroadcastOptions, Message};
    use crate::test_helpers::{test_config, ChannelTransport};

    fn registry() -> RoomRegistry {
        RoomRegistry::new(test_config(), Arc::new(NoopLiveChannels)).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let room = registry
            .create_room(RoomBuilder::new("lobby").root_user("owner", "pw"))
            .await
            .unwrap();

        assert!(registry.contains("lobby"));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get_room("lobby").unwrap(), &room));
        assert!(matches!(registry.get_room("missing"), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let registry = registry();
        let first = registry.create_room(RoomBuilder::new("dup")).await.unwrap();
        assert!(matches!(
            registry.create_room(RoomBuilder::new("dup")).await,
            Err(Error::AlreadyExists(_))
        ));
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_create_single_winner() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.create_room(RoomBuilder::new("race")).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, Error::AlreadyExists(_))),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_id() {
        let registry = registry();
        assert!(matches!(
            registry.create_room(RoomBuilder::new("")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_del_room_closes_and_releases() {
        let mut live = MockLiveChannels::new();
        live.expect_release_room()
            .withf(|id| id.as_str() == "gone")
            .times(1)
            .return_const(());
        let registry = RoomRegistry::new(test_config(), Arc::new(live)).unwrap();

        let room = registry
            .create_room(RoomBuilder::new("gone").root_user("owner", "pw"))
            .await
            .unwrap();
        let owner = room.get_user_by_name("owner").unwrap();
        let (transport, _rx) = ChannelTransport::new();
        let conn = room.reg_client(&owner, transport).await.unwrap();

        registry.del_room("gone").await.unwrap();
        assert!(room.is_closed());
        assert!(conn.is_closed());
        assert!(!registry.contains("gone"));
        assert!(matches!(
            room.broadcast(Message::Ping, BroadcastOptions::default()).await,
            Err(Error::HubClosed)
        ));
        assert!(matches!(registry.del_room("gone").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let registry = registry();
        registry.create_room(RoomBuilder::new("open")).await.unwrap();
        registry
            .create_room(RoomBuilder::new("secret").hidden(true))
            .await
            .unwrap();

        assert_eq!(registry.list_rooms(RoomFilter::All).len(), 2);

        let hidden = registry.list_rooms(RoomFilter::Hidden);
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].id.as_str(), "secret");

        let visible = registry.list_rooms(RoomFilter::Visible);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id.as_str(), "open");
    }

    #[tokio::test]
    async fn test_load_room() {
        let registry = registry();
        let room = RoomBuilder::new("restored")
            .version(42)
            .build(Arc::clone(registry.config()), Arc::new(NoopLiveChannels))
            .await
            .unwrap();
        registry.load_room(room).unwrap();
        assert_eq!(registry.get_room("restored").unwrap().version(), 42);

        let again = RoomBuilder::new("restored")
            .build(Arc::clone(registry.config()), Arc::new(NoopLiveChannels))
            .await
            .unwrap();
        assert!(matches!(registry.load_room(again), Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = registry();
        let a = registry.create_room(RoomBuilder::new("a")).await.unwrap();
        let b = registry.create_room(RoomBuilder::new("b")).await.unwrap();

        registry.close_all().await;
        assert!(registry.is_empty());
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[test]
    fn test_registry_rejects_zero_capacity() {
        let config = RoomConfig {
            hub_queue_capacity: 0,
            ..RoomConfig::default()
        };
        assert!(RoomRegistry::new(config, Arc::new(NoopLiveChannels)).is_err());
    }
}
