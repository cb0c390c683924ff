use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synctv_room_proto::{ElementMessage, ElementMessageType};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn, Instrument};

use super::client::ClientConnection;
use super::message::{Message, Transport};
use crate::config::RoomConfig;
use crate::logging::room_span;
use crate::models::{RoomId, User};
use crate::{Error, Result};

/// Who a broadcast skips
#[derive(Debug, Clone, Default)]
pub struct BroadcastOptions {
    sender: Option<String>,
    include_sender: bool,
    ignore: HashSet<String>,
}

impl BroadcastOptions {
    /// Broadcast on behalf of `sender`, who is skipped unless
    /// [`include_sender`](Self::include_sender) is set.
    #[must_use]
    pub fn from_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn include_sender(mut self) -> Self {
        self.include_sender = true;
        self
    }

    #[must_use]
    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    fn skips(&self, name: &str) -> bool {
        if !self.include_sender && self.sender.as_deref() == Some(name) {
            return true;
        }
        self.ignore.contains(name)
    }
}

#[derive(Debug)]
struct BroadcastRequest {
    message: Message,
    options: BroadcastOptions,
}

type Clients = Arc<DashMap<String, Arc<ClientConnection>>>;

/// Per-room fan-out hub
///
/// Broadcasts go through one bounded queue consumed by a single task, so
/// every surviving connection sees them in publish order. Delivery into a
/// connection never waits: a full or closed mailbox gets that connection
/// dropped instead.
///
/// A connection that goes away without `unregister_client` (slow, or its
/// transport failed) leaves the client map at once, and the loop tells the
/// remaining viewers the new head count.
#[derive(Debug)]
pub struct Hub {
    room_id: RoomId,
    clients: Clients,
    queue: mpsc::Sender<BroadcastRequest>,
    departures: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    mailbox_capacity: usize,
}

impl Hub {
    /// Create a hub and start its broadcast loop. Must be called inside a
    /// Tokio runtime.
    #[must_use]
    pub fn new(room_id: RoomId, config: &RoomConfig) -> Self {
        let (queue, rx) = mpsc::channel(config.hub_queue_capacity);
        let (departures, departed) = mpsc::unbounded_channel();
        let clients: Clients = Arc::new(DashMap::new());
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(
            broadcast_loop(Arc::clone(&clients), rx, departed, shutdown.clone())
                .instrument(room_span(&room_id)),
        );

        Self {
            room_id,
            clients,
            queue,
            departures,
            closed: AtomicBool::new(false),
            shutdown,
            tracker,
            mailbox_capacity: config.mailbox_capacity,
        }
    }

    /// Register `user`'s transport. A user holds at most one open
    /// connection; a closed one still in the map is replaced.
    pub fn register_client<T: Transport>(&self, user: &User, transport: T) -> Result<Arc<ClientConnection>> {
        if self.is_closed() {
            return Err(Error::HubClosed);
        }

        let conn = match self.clients.entry(user.name().to_string()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => {
                return Err(Error::AlreadyExists(format!(
                    "client for user {}",
                    user.name()
                )));
            }
            Entry::Occupied(mut entry) => {
                let conn = ClientConnection::spawn(user, transport, self.mailbox_capacity);
                entry.insert(Arc::clone(&conn));
                conn
            }
            Entry::Vacant(entry) => {
                let conn = ClientConnection::spawn(user, transport, self.mailbox_capacity);
                entry.insert(Arc::clone(&conn));
                conn
            }
        };

        // lost a race with close(): its sweep may have missed this entry
        if self.is_closed() {
            self.clients
                .remove_if(user.name(), |_, c| Arc::ptr_eq(c, &conn));
            let _ = conn.close();
            return Err(Error::HubClosed);
        }
        self.watch(&conn);

        info!(
            room_id = %self.room_id,
            user = %user.name(),
            connection_id = %conn.id(),
            clients = self.clients.len(),
            "Client registered"
        );
        Ok(conn)
    }

    /// Drop `conn` from the map once it closes on its own and report the
    /// departure to the loop. Explicit removals get there first, so they are
    /// not reported.
    fn watch(&self, conn: &Arc<ClientConnection>) {
        let clients = Arc::clone(&self.clients);
        let departures = self.departures.clone();
        let shutdown = self.shutdown.clone();
        let conn = Arc::clone(conn);

        self.tracker.spawn(
            async move {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = conn.closed() => {
                        let removed = clients
                            .remove_if(conn.user_name(), |_, c| Arc::ptr_eq(c, &conn))
                            .is_some();
                        if removed {
                            let _ = departures.send(conn.user_name().to_string());
                        }
                    }
                }
            }
            .instrument(room_span(&self.room_id)),
        );
    }

    /// Remove and close the connection registered for `user_name`.
    pub fn unregister_client(&self, user_name: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::HubClosed);
        }
        let (_, conn) = self
            .clients
            .remove(user_name)
            .ok_or_else(|| Error::NotFound(format!("client for user {user_name}")))?;
        let _ = conn.close();

        info!(
            room_id = %self.room_id,
            user = %user_name,
            connection_id = %conn.id(),
            clients = self.clients.len(),
            "Client unregistered"
        );
        Ok(())
    }

    /// Queue `message` for every connection not skipped by `options`.
    ///
    /// Waits while the queue is full; returns once the message is queued,
    /// not once it is delivered.
    pub async fn broadcast(&self, message: Message, options: BroadcastOptions) -> Result<()> {
        if self.is_closed() {
            return Err(Error::HubClosed);
        }
        let _guard = self.tracker.token();
        if self.is_closed() {
            return Err(Error::HubClosed);
        }
        self.queue
            .send(BroadcastRequest { message, options })
            .await
            .map_err(|_| Error::HubClosed)
    }

    /// Force-close every connection while keeping the hub open.
    pub fn close_clients(&self) -> usize {
        let clients: Vec<Arc<ClientConnection>> =
            self.clients.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut closed = 0;
        for conn in clients {
            self.clients
                .remove_if(conn.user_name(), |_, c| Arc::ptr_eq(c, &conn));
            if conn.close().is_ok() {
                closed += 1;
            }
        }
        closed
    }

    /// Stop the hub: drop queued broadcasts, close every connection and wait
    /// for the loop and in-flight broadcasts to finish. Only the first call
    /// succeeds.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyClosed(format!("hub of room {}", self.room_id)));
        }

        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        let closed = self.close_clients();
        info!(
            room_id = %self.room_id,
            closed_clients = closed,
            "Hub closed"
        );
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn has_client(&self, user_name: &str) -> bool {
        self.clients.contains_key(user_name)
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let closed = self.close_clients();
        if closed > 0 {
            debug!(room_id = %self.room_id, closed_clients = closed, "Hub dropped without close");
        }
    }
}

async fn broadcast_loop(
    clients: Clients,
    mut rx: mpsc::Receiver<BroadcastRequest>,
    mut departed: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
) {
    loop {
        let mut dropped = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(user) = departed.recv() => {
                debug!(user = %user, "Client left without unregistering");
                1
            }
            request = rx.recv() => match request {
                Some(request) => fan_out(&clients, request),
                None => break,
            },
        };

        // announcing can drop more slow clients, each round removes at least one
        while dropped > 0 {
            dropped = fan_out(&clients, people_changed(&clients));
        }
    }

    // fail pending senders, then discard what is left
    rx.close();
    let mut dropped = 0usize;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    debug!(dropped, "Broadcast loop stopped");
}

fn people_changed(clients: &Clients) -> BroadcastRequest {
    let people = i64::try_from(clients.len()).unwrap_or(i64::MAX);
    let msg = ElementMessage::new(ElementMessageType::PeopleChanged)
        .with_people_num(people)
        .with_time(Utc::now().timestamp_millis());
    BroadcastRequest {
        message: Message::from(&msg),
        options: BroadcastOptions::default(),
    }
}

/// Deliver one request; returns how many clients were dropped.
fn fan_out(clients: &Clients, request: BroadcastRequest) -> usize {
    let BroadcastRequest { message, options } = request;

    let mut failed = Vec::new();
    for entry in clients.iter() {
        if options.skips(entry.key()) {
            continue;
        }
        if let Err(e) = entry.value().send(message.clone()) {
            failed.push((Arc::clone(entry.value()), e));
        }
    }

    // never mutate the map while iterating it
    let dropped = failed.len();
    for (conn, err) in failed {
        clients.remove_if(conn.user_name(), |_, c| Arc::ptr_eq(c, &conn));
        let _ = conn.close();
        warn!(
            user = %conn.user_name(),
            connection_id = %conn.id(),
            event_type = message.event_type(),
            error = %err,
            "Client cannot keep up, force-closed"
        );
    }
    dropped
}
