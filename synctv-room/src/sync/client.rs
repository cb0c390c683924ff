use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use super::message::{Message, Transport};
use crate::models::{generate_id, User, UserId};
use crate::{Error, Result};

/// Handle for a client connection
pub type ConnectionId = String;

/// One viewer's live connection: a transport plus a bounded outbound mailbox
///
/// A background writer drains the mailbox into the transport. Sends never
/// wait; a full mailbox is reported to the caller so the hub can drop the
/// viewer instead of stalling the room.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    user_id: UserId,
    user_name: String,
    mailbox: RwLock<Option<mpsc::Sender<Message>>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl ClientConnection {
    /// Wrap `transport` and start its writer task.
    pub(crate) fn spawn<T: Transport>(user: &User, transport: T, capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = Arc::new(Self {
            id: generate_id(),
            user_id: user.id().clone(),
            user_name: user.name().to_string(),
            mailbox: RwLock::new(Some(tx)),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        let span = tracing::debug_span!(
            "client",
            user = %conn.user_name,
            connection_id = %conn.id
        );
        tokio::spawn(write_loop(Arc::clone(&conn), transport, rx).instrument(span));

        conn
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Queue `message` without waiting.
    ///
    /// Fails with `Backpressure` when the mailbox is full and
    /// `AlreadyClosed` once the connection is closed.
    pub fn send(&self, message: Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::AlreadyClosed(format!("connection {}", self.id)));
        }
        let mailbox = self.mailbox.read();
        let Some(tx) = mailbox.as_ref() else {
            return Err(Error::AlreadyClosed(format!("connection {}", self.id)));
        };
        tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Backpressure(format!("connection {} mailbox full", self.id))
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::AlreadyClosed(format!("connection {}", self.id))
            }
        })
    }

    /// Close the mailbox and stop the writer.
    ///
    /// Waits for in-flight `send` calls, so nothing is written to a closed
    /// mailbox. Only the first call succeeds.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyClosed(format!("connection {}", self.id)));
        }
        self.mailbox.write().take();
        self.shutdown.cancel();
        debug!(
            user = %self.user_name,
            connection_id = %self.id,
            "Client connection closed"
        );
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection is closed, by either side.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }
}

async fn write_loop<T: Transport>(
    conn: Arc<ClientConnection>,
    mut transport: T,
    mut rx: mpsc::Receiver<Message>,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = conn.shutdown.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            () = conn.shutdown.cancelled() => break,
            result = transport.send(message) => result,
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to write to client transport, closing");
            let _ = conn.close();
            break;
        }
    }

    if let Err(e) = transport.close().await {
        debug!(error = %e, "Client transport close failed");
    }
}
