//! Room: the isolation unit of synchronized viewing
//!
//! A room owns its playlist, playback state, broadcast hub and user
//! registry. Mutations update local state first and then publish an
//! `ElementMessage` through the hub so connected viewers can follow.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use synctv_room_proto::{ElementMessage, ElementMessageType};
use tracing::{info, warn};

use super::live::LiveChannels;
use super::password;
use super::playback::PlaybackState;
use super::playlist::Playlist;
use crate::config::RoomConfig;
use crate::models::{
    BaseMovie, CurrentInfo, Movie, MovieId, MovieInfo, RoomId, Status, User, UserId, UserRecord,
};
use crate::sync::{BroadcastOptions, ClientConnection, Hub, Message, Transport};
use crate::{Error, Result};

enum RootSeed {
    Credentials { name: String, password: String },
    Loaded(UserRecord),
}

/// Composable room construction
///
/// ```rust,ignore
/// let room = RoomBuilder::new("lobby")
///     .hidden(true)
///     .password("secret")
///     .root_user("owner", "owner-password")
///     .build(config, live)
///     .await?;
/// ```
#[must_use]
pub struct RoomBuilder {
    id: String,
    version: Option<u32>,
    hidden: bool,
    password: Option<String>,
    password_hash: Option<String>,
    root: Option<RootSeed>,
    created_at: Option<DateTime<Utc>>,
}

impl RoomBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            hidden: false,
            password: None,
            password_hash: None,
            root: None,
            created_at: None,
        }
    }

    /// Initial version token; random when unset.
    pub const fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Plain password, hashed on build. Empty means no password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Already hashed password, for rooms restored from storage.
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Seed the root user from credentials.
    pub fn root_user(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.root = Some(RootSeed::Credentials {
            name: name.into(),
            password: password.into(),
        });
        self
    }

    /// Seed the root user from a stored record.
    pub fn root_user_record(mut self, record: UserRecord) -> Self {
        self.root = Some(RootSeed::Loaded(record));
        self
    }

    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Start from stored room settings. Users and movies are loaded into the
    /// built room afterwards.
    pub fn from_record(record: RoomRecord) -> Self {
        let builder = Self::new(record.id.as_str())
            .version(record.version)
            .hidden(record.hidden)
            .created_at(record.created_at);
        match record.password_hash {
            Some(hash) => builder.password_hash(hash),
            None => builder,
        }
    }

    pub(crate) fn room_id(&self, config: &RoomConfig) -> Result<RoomId> {
        RoomId::parse(self.id.clone(), config.max_room_id_len)
    }

    /// Validate everything, hash secrets and start the room's hub.
    pub async fn build(self, config: Arc<RoomConfig>, live: Arc<dyn LiveChannels>) -> Result<Room> {
        config.validate()?;
        let id = self.room_id(&config)?;

        let password_hash = match (self.password_hash, self.password) {
            (Some(hash), _) if !hash.is_empty() => Some(hash),
            (_, Some(plain)) if !plain.is_empty() => {
                check_password_len(&plain, &config)?;
                Some(password::hash_password(&plain, config.password_cost).await?)
            }
            _ => None,
        };

        let root = match self.root {
            Some(RootSeed::Credentials { name, password }) => {
                check_user_name(&name, &config)?;
                check_user_password(&password, &config)?;
                let hash = password::hash_password(&password, config.password_cost).await?;
                Some(User::new(UserId::new(), name, hash, true, true))
            }
            Some(RootSeed::Loaded(mut record)) => {
                check_user_name(&record.name, &config)?;
                record.root = true;
                Some(User::from_record(record))
            }
            None => None,
        };

        let now = Utc::now();
        let room = Room {
            hub: Hub::new(id.clone(), &config),
            id,
            config,
            password_hash: RwLock::new(password_hash),
            version: AtomicU32::new(self.version.unwrap_or_else(rand::random)),
            hidden: AtomicBool::new(self.hidden),
            created_at: self.created_at.unwrap_or(now),
            last_active: AtomicI64::new(now.timestamp_millis()),
            playlist: Playlist::new(),
            playback: PlaybackState::new(),
            next_movie_id: AtomicU64::new(1),
            users: DashMap::new(),
            user_names: DashMap::new(),
            root_user_id: root.as_ref().map(|user| user.id().clone()),
            live,
        };

        if let Some(root) = root {
            room.user_names
                .insert(root.name().to_string(), root.id().clone());
            room.users.insert(root.id().clone(), Arc::new(root));
        }

        Ok(room)
    }
}

fn check_user_name(name: &str, config: &RoomConfig) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("user name is empty".to_string()));
    }
    if name.len() > config.max_user_name_len {
        return Err(Error::InvalidInput(format!(
            "user name is longer than {} bytes",
            config.max_user_name_len
        )));
    }
    Ok(())
}

fn check_password_len(password: &str, config: &RoomConfig) -> Result<()> {
    if password.len() > config.max_password_len {
        return Err(Error::InvalidInput(format!(
            "password is longer than {} bytes",
            config.max_password_len
        )));
    }
    Ok(())
}

fn check_user_password(password: &str, config: &RoomConfig) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidInput("user password is empty".to_string()));
    }
    check_password_len(password, config)
}

/// Room summary for directory listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub hidden: bool,
    pub need_password: bool,
    pub version: u32,
    pub people_num: usize,
    pub movie_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Stored room settings, including the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub hidden: bool,
    pub version: u32,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct Room {
    id: RoomId,
    config: Arc<RoomConfig>,
    password_hash: RwLock<Option<String>>,
    version: AtomicU32,
    hidden: AtomicBool,
    created_at: DateTime<Utc>,
    last_active: AtomicI64,
    hub: Hub,
    playlist: Playlist,
    playback: PlaybackState,
    next_movie_id: AtomicU64,
    users: DashMap<UserId, Arc<User>>,
    user_names: DashMap<String, UserId>,
    root_user_id: Option<UserId>,
    live: Arc<dyn LiveChannels>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("hidden", &self.is_hidden())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Room {
    #[must_use]
    pub const fn id(&self) -> &RoomId {
        &self.id
    }

    #[must_use]
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            hidden: self.is_hidden(),
            need_password: self.need_password(),
            version: self.version(),
            people_num: self.people_num(),
            movie_count: self.playlist.len(),
            created_at: self.created_at,
            last_active: self.last_active(),
        }
    }

    #[must_use]
    pub fn record(&self) -> RoomRecord {
        RoomRecord {
            id: self.id.clone(),
            hidden: self.is_hidden(),
            version: self.version(),
            password_hash: self.password_hash(),
            created_at: self.created_at,
        }
    }

    fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.hub.is_closed() {
            return Err(Error::HubClosed);
        }
        Ok(())
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.hub.is_closed()
    }

    // ----- visibility, version and password -----

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Release);
        self.touch();
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn check_version(&self, version: u32) -> bool {
        self.version() == version
    }

    #[must_use]
    pub fn need_password(&self) -> bool {
        self.password_hash.read().is_some()
    }

    #[must_use]
    pub fn password_hash(&self) -> Option<String> {
        self.password_hash.read().clone()
    }

    /// Replace the room password; empty removes the requirement. Bumps the
    /// version so tokens issued against the old password stop matching.
    pub async fn set_password(&self, password: &str) -> Result<()> {
        check_password_len(password, &self.config)?;
        let hash = if password.is_empty() {
            None
        } else {
            Some(password::hash_password(password, self.config.password_cost).await?)
        };
        *self.password_hash.write() = hash;
        self.version.fetch_add(1, Ordering::AcqRel);
        self.touch();
        info!(room_id = %self.id, need_password = self.need_password(), "Room password changed");
        Ok(())
    }

    /// `Ok(true)` when `password` opens the room. Rooms without a password
    /// accept anything.
    pub async fn check_password(&self, password: &str) -> Result<bool> {
        let Some(hash) = self.password_hash.read().clone() else {
            return Ok(true);
        };
        password::verify_password(password, &hash).await
    }

    /// Change the password and drop every open connection so no session
    /// outlives it.
    pub async fn set_password_and_close_all(&self, password: &str) -> Result<()> {
        self.set_password(password).await?;
        let closed = self.hub.close_clients();
        info!(room_id = %self.id, closed_clients = closed, "Closed all clients after password change");
        Ok(())
    }

    // ----- users -----

    /// Create a room user. Names are unique within the room.
    pub async fn new_user(&self, name: &str, password: &str, admin: bool) -> Result<Arc<User>> {
        self.ensure_open()?;
        check_user_name(name, &self.config)?;
        check_user_password(password, &self.config)?;
        if self.user_names.contains_key(name) {
            return Err(Error::AlreadyExists(format!("user {name}")));
        }

        let hash = password::hash_password(password, self.config.password_cost).await?;
        let user = Arc::new(User::new(UserId::new(), name.to_string(), hash, admin, false));
        self.insert_user(Arc::clone(&user))?;
        self.touch();

        info!(room_id = %self.id, user = %name, admin, "Room user created");
        Ok(user)
    }

    /// Register a stored user. Root users only come from the builder.
    pub fn load_user(&self, record: UserRecord) -> Result<Arc<User>> {
        if record.root {
            return Err(Error::InvalidInput(
                "root user is set at room creation".to_string(),
            ));
        }
        check_user_name(&record.name, &self.config)?;
        let user = Arc::new(User::from_record(record));
        self.insert_user(Arc::clone(&user))?;
        Ok(user)
    }

    /// Change a room user's password. Tokens carrying the user's old version
    /// stop matching.
    pub async fn set_user_password(&self, user: &User, password: &str) -> Result<()> {
        if !self.users.contains_key(user.id()) {
            return Err(Error::NotFound(format!("user {} in room {}", user.name(), self.id)));
        }
        check_user_password(password, &self.config)?;
        let hash = password::hash_password(password, self.config.password_cost).await?;
        user.set_password_hash(hash);
        self.touch();
        info!(room_id = %self.id, user = %user.name(), "Room user password changed");
        Ok(())
    }

    fn insert_user(&self, user: Arc<User>) -> Result<()> {
        match self.user_names.entry(user.name().to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("user {}", user.name()))),
            Entry::Vacant(entry) => {
                if self.users.contains_key(user.id()) {
                    return Err(Error::AlreadyExists(format!("user id {}", user.id())));
                }
                self.users.insert(user.id().clone(), Arc::clone(&user));
                entry.insert(user.id().clone());
                Ok(())
            }
        }
    }

    pub fn get_user(&self, id: &UserId) -> Result<Arc<User>> {
        self.users
            .get(id)
            .map(|user| Arc::clone(user.value()))
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Arc<User>> {
        let id = self
            .user_names
            .get(name)
            .map(|id| id.value().clone())
            .ok_or_else(|| Error::NotFound(format!("user {name}")))?;
        self.get_user(&id)
    }

    #[must_use]
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Delete a non-root user and drop their connection, if any.
    pub async fn del_user(&self, name: &str) -> Result<()> {
        let user = self.get_user_by_name(name)?;
        if self.is_root(&user) {
            return Err(Error::InvalidInput("root user cannot be deleted".to_string()));
        }
        self.user_names.remove(name);
        self.users.remove(user.id());
        self.touch();
        info!(room_id = %self.id, user = %name, "Room user deleted");

        if self.hub.has_client(name) {
            self.unreg_client(&user).await?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn root_user_id(&self) -> Option<&UserId> {
        self.root_user_id.as_ref()
    }

    /// Root identity is the stored id, never the object.
    #[must_use]
    pub fn is_root(&self, user: &User) -> bool {
        self.root_user_id.as_ref() == Some(user.id())
    }

    fn creator_name(&self, id: &UserId) -> Option<String> {
        self.users.get(id).map(|user| user.name().to_string())
    }

    // ----- playlist -----

    /// Allocate an id and build a movie created by `creator`. The movie is
    /// not queued yet.
    pub fn new_movie(&self, creator: &User, base: BaseMovie) -> Result<Movie> {
        let id = MovieId(self.next_movie_id.fetch_add(1, Ordering::AcqRel));
        Movie::new(id, base, creator.id().clone())
    }

    /// Build and append a movie in one step.
    pub async fn add_movie(&self, creator: &User, base: BaseMovie) -> Result<Movie> {
        let movie = self.new_movie(creator, base)?;
        self.push_back_movie(creator, movie.clone()).await?;
        Ok(movie)
    }

    pub async fn push_back_movie(&self, operator: &User, movie: Movie) -> Result<()> {
        self.push_movie(operator, movie, false).await
    }

    pub async fn push_front_movie(&self, operator: &User, movie: Movie) -> Result<()> {
        self.push_movie(operator, movie, true).await
    }

    async fn push_movie(&self, operator: &User, movie: Movie, front: bool) -> Result<()> {
        self.ensure_open()?;
        let id = movie.id;
        let pull_key = movie.pull_key.clone();
        if front {
            self.playlist.push_front(movie)?;
        } else {
            self.playlist.push_back(movie)?;
        }

        if let Some(key) = &pull_key {
            if let Err(e) = self.live.create_channel(&self.id, key) {
                let _ = self.playlist.delete_many(&[id]);
                return Err(e);
            }
        }
        // close() may have drained the playlist while the channel was created
        if self.hub.is_closed() {
            let _ = self.playlist.delete_many(&[id]);
            if let Some(key) = &pull_key {
                self.release_channel(key);
            }
            return Err(Error::HubClosed);
        }
        self.touch();
        operator.update_last_act();

        info!(room_id = %self.id, user = %operator.name(), movie_id = %id, front, "Movie added");
        self.broadcast_movies_changed(operator).await
    }

    /// Restore stored movies in order, advancing the id counter past them.
    /// Either every movie is queued with its live channel, or none is.
    pub fn load_movies(&self, movies: Vec<Movie>) -> Result<()> {
        self.ensure_open()?;
        let mut created: Vec<String> = Vec::new();
        for key in movies.iter().filter_map(|movie| movie.pull_key.as_deref()) {
            if let Err(e) = self.live.create_channel(&self.id, key) {
                for key in &created {
                    self.release_channel(key);
                }
                return Err(e);
            }
            created.push(key.to_string());
        }

        let next_id = movies.iter().map(|movie| movie.id.get().saturating_add(1)).max();
        let count = movies.len();
        if let Err(e) = self.playlist.push_back_many(movies) {
            for key in &created {
                self.release_channel(key);
            }
            return Err(e);
        }
        if let Some(next_id) = next_id {
            self.next_movie_id.fetch_max(next_id, Ordering::AcqRel);
        }
        info!(room_id = %self.id, count, "Movies loaded");
        Ok(())
    }

    /// Replace a movie's base info. A new pull key gets its channel before
    /// the edit is stored; a failed channel leaves the movie untouched.
    pub async fn edit_movie(&self, operator: &User, id: MovieId, base: BaseMovie) -> Result<Movie> {
        self.ensure_open()?;
        let (before, after) = self.playlist.edit_with(id, base, |before, after| {
            match &after.pull_key {
                Some(key) if before.pull_key != after.pull_key => {
                    self.live.create_channel(&self.id, key)
                }
                _ => Ok(()),
            }
        })?;

        let rekeyed = before.pull_key != after.pull_key;
        if rekeyed {
            if let Some(old) = &before.pull_key {
                self.release_channel(old);
            }
        }
        if self.hub.is_closed() {
            if let Some(new) = after.pull_key.as_deref().filter(|_| rekeyed) {
                self.release_channel(new);
            }
            return Err(Error::HubClosed);
        }
        self.playback.refresh_movie(&after);
        self.touch();
        operator.update_last_act();

        self.broadcast_movies_changed(operator).await?;
        Ok(after)
    }

    /// Remove movies, all or none, releasing their live channels.
    pub async fn del_movies(&self, operator: &User, ids: &[MovieId]) -> Result<()> {
        self.ensure_open()?;
        let removed = self.playlist.delete_many(ids)?;
        self.release_channels(&removed);
        self.touch();
        operator.update_last_act();

        info!(room_id = %self.id, user = %operator.name(), count = removed.len(), "Movies deleted");
        self.broadcast_movies_changed(operator).await
    }

    pub async fn clear_movies(&self, operator: &User) -> Result<()> {
        self.ensure_open()?;
        let removed = self.playlist.get_and_clear();
        self.release_channels(&removed);
        self.touch();
        operator.update_last_act();

        info!(room_id = %self.id, user = %operator.name(), count = removed.len(), "Playlist cleared");
        self.broadcast_movies_changed(operator).await
    }

    pub async fn swap_movie(&self, operator: &User, a: MovieId, b: MovieId) -> Result<()> {
        self.ensure_open()?;
        self.playlist.swap(a, b)?;
        self.touch();
        operator.update_last_act();
        self.broadcast_movies_changed(operator).await
    }

    pub fn get_movie(&self, id: MovieId) -> Result<Movie> {
        self.playlist.get(id)
    }

    pub fn get_movie_by_pull_key(&self, pull_key: &str) -> Result<Movie> {
        self.playlist.get_by_pull_key(pull_key)
    }

    /// Ordered playlist as seen by `viewer`.
    #[must_use]
    pub fn movie_list(&self, viewer: Option<&UserId>) -> Vec<MovieInfo> {
        self.playlist.snapshot(viewer, |id| self.creator_name(id))
    }

    /// One page of the playlist (1-based) and the total count.
    #[must_use]
    pub fn movie_page(&self, page: usize, page_size: usize, viewer: Option<&UserId>) -> (Vec<MovieInfo>, usize) {
        self.playlist
            .page(page, page_size, viewer, |id| self.creator_name(id))
    }

    /// Raw movies in order, for persistence.
    #[must_use]
    pub fn movies(&self) -> Vec<Movie> {
        self.playlist.movies()
    }

    fn release_channel(&self, pull_key: &str) {
        if let Err(e) = self.live.delete_channel(&self.id, pull_key) {
            warn!(room_id = %self.id, pull_key = %pull_key, error = %e, "Failed to release live channel");
        }
    }

    fn release_channels(&self, movies: &[Movie]) {
        for key in movies.iter().filter_map(|movie| movie.pull_key.as_deref()) {
            self.release_channel(key);
        }
    }

    // ----- playback -----

    /// Make movie `id` current and rewind it.
    pub async fn change_current_movie(&self, operator: &User, id: MovieId) -> Result<Status> {
        self.ensure_open()?;
        let movie = self.playlist.get(id)?;
        let status = self.playback.set_movie(movie);
        self.touch();
        operator.update_last_act();

        info!(room_id = %self.id, user = %operator.name(), movie_id = %id, "Current movie changed");
        let msg = ElementMessage::new(ElementMessageType::CurrentChanged)
            .with_sender(operator.name())
            .with_movie_id(id.get())
            .with_status(status.into());
        self.publish(msg, BroadcastOptions::from_sender(operator.name()).include_sender())
            .await?;
        Ok(status)
    }

    /// Apply a client's full playback report. `time_diff` is the client's
    /// estimated delay in seconds.
    pub async fn set_status(
        &self,
        operator: &User,
        playing: bool,
        seek: f64,
        rate: f64,
        time_diff: f64,
    ) -> Result<Status> {
        self.ensure_open()?;
        let status = self.playback.set_status(playing, seek, rate, time_diff);
        let kind = if status.playing {
            ElementMessageType::Play
        } else {
            ElementMessageType::Pause
        };
        self.publish_status(operator, kind, status).await
    }

    pub async fn set_seek_rate(&self, operator: &User, seek: f64, rate: f64, time_diff: f64) -> Result<Status> {
        self.ensure_open()?;
        let status = self.playback.set_seek_rate(seek, rate, time_diff);
        self.publish_status(operator, ElementMessageType::ChangeRate, status)
            .await
    }

    pub async fn set_seek(&self, operator: &User, seek: f64, time_diff: f64) -> Result<Status> {
        self.ensure_open()?;
        let status = self.playback.set_seek(seek, time_diff);
        self.publish_status(operator, ElementMessageType::ChangeSeek, status)
            .await
    }

    async fn publish_status(&self, operator: &User, kind: ElementMessageType, status: Status) -> Result<Status> {
        self.touch();
        operator.update_last_act();
        let msg = ElementMessage::new(kind)
            .with_sender(operator.name())
            .with_status(status.into());
        self.publish(msg, BroadcastOptions::from_sender(operator.name()))
            .await?;
        Ok(status)
    }

    /// Extrapolated status right now.
    #[must_use]
    pub fn status(&self) -> Status {
        self.playback.status()
    }

    /// Current movie as seen by `viewer`, with its status.
    #[must_use]
    pub fn current(&self, viewer: Option<&UserId>) -> CurrentInfo {
        let (movie, status) = self.playback.current();
        CurrentInfo {
            movie: movie.map(|m| m.to_info(self.creator_name(&m.creator_id), viewer)),
            status,
        }
    }

    // ----- connections -----

    /// Attach `user`'s transport to the hub and announce the new head count.
    pub async fn reg_client<T: Transport>(&self, user: &User, transport: T) -> Result<Arc<ClientConnection>> {
        if !self.users.contains_key(user.id()) {
            return Err(Error::NotFound(format!("user {} in room {}", user.name(), self.id)));
        }
        let conn = self.hub.register_client(user, transport)?;
        user.update_last_act();
        self.publish_people_changed().await?;
        Ok(conn)
    }

    pub async fn unreg_client(&self, user: &User) -> Result<()> {
        self.hub.unregister_client(user.name())?;
        self.publish_people_changed().await
    }

    /// Raw broadcast, for messages produced outside the room (chat, sync
    /// checks, keepalives).
    pub async fn broadcast(&self, message: impl Into<Message>, options: BroadcastOptions) -> Result<()> {
        self.hub.broadcast(message.into(), options).await
    }

    #[must_use]
    pub fn people_num(&self) -> usize {
        self.hub.client_count()
    }

    async fn publish(&self, msg: ElementMessage, options: BroadcastOptions) -> Result<()> {
        let msg = msg.with_time(Utc::now().timestamp_millis());
        self.hub.broadcast(Message::from(&msg), options).await
    }

    async fn broadcast_movies_changed(&self, operator: &User) -> Result<()> {
        let msg = ElementMessage::new(ElementMessageType::MoviesChanged).with_sender(operator.name());
        self.publish(msg, BroadcastOptions::from_sender(operator.name()).include_sender())
            .await
    }

    async fn publish_people_changed(&self) -> Result<()> {
        let people = i64::try_from(self.people_num()).unwrap_or(i64::MAX);
        let msg = ElementMessage::new(ElementMessageType::PeopleChanged).with_people_num(people);
        self.publish(msg, BroadcastOptions::default()).await
    }

    // ----- lifecycle -----

    /// Close the hub and release every live channel. Only the first call
    /// succeeds.
    pub async fn close(&self) -> Result<()> {
        self.hub.close().await?;
        let removed = self.playlist.get_and_clear();
        self.release_channels(&removed);
        info!(room_id = %self.id, released_movies = removed.len(), "Room closed");
        Ok(())
    }
}
