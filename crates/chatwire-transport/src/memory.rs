//! In-process transport with a scriptable server side.
//!
//! [`pair`] returns a [`MemoryConnector`] for the client under test and a
//! [`MemoryServer`] that the test drives: it accepts connections, reads
//! what the client sent, pushes frames back, and closes or drops the
//! connection with any code.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
    CloseCode, Connector, FrameReceiver, FrameSender, TransportError,
    TransportEvent,
};

#[derive(Default)]
struct Shared {
    /// Failures to return from upcoming connect calls, oldest first.
    refusals: VecDeque<TransportError>,
    /// Every URL a connect was attempted with.
    urls: Vec<String>,
    connect_delay: Duration,
}

/// Creates a connected connector/server pair.
pub fn pair() -> (MemoryConnector, MemoryServer) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            shared: Arc::clone(&shared),
            accepted_tx,
        },
        MemoryServer {
            shared,
            accepted_rx,
        },
    )
}

/// Client-side [`Connector`] backed by in-process channels.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
    accepted_tx: mpsc::UnboundedSender<ServerConnection>,
}

impl Connector for MemoryConnector {
    type Sender = MemorySender;
    type Receiver = MemoryReceiver;

    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Self::Sender, Self::Receiver), TransportError> {
        let (refusal, delay) = {
            let mut shared =
                self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.urls.push(url.to_string());
            (shared.refusals.pop_front(), shared.connect_delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = refusal {
            return Err(err);
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let conn = ServerConnection {
            url: url.to_string(),
            from_client: server_rx,
            to_client: server_tx,
        };
        self.accepted_tx.send(conn).map_err(|_| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory server dropped",
            ))
        })?;

        Ok((
            MemorySender { tx: client_tx },
            MemoryReceiver { rx: client_rx },
        ))
    }
}

/// Write half handed to the client.
pub struct MemorySender {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl FrameSender for MemorySender {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(TransportEvent::Frame(data))
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        self.tx
            .send(TransportEvent::Closed(code))
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }
}

/// Read half handed to the client.
pub struct MemoryReceiver {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl FrameReceiver for MemoryReceiver {
    async fn recv(&mut self) -> Result<TransportEvent, TransportError> {
        // A dropped server end looks like a network drop.
        Ok(self
            .rx
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed(CloseCode::ABNORMAL)))
    }
}

/// The test-controlled side of a [`MemoryConnector`].
pub struct MemoryServer {
    shared: Arc<Mutex<Shared>>,
    accepted_rx: mpsc::UnboundedReceiver<ServerConnection>,
}

impl MemoryServer {
    /// Makes the next connect attempt fail with `err`. Calls queue up.
    pub fn refuse_next(&self, err: TransportError) {
        self.lock().refusals.push_back(err);
    }

    /// Makes every connect attempt take `delay` before resolving.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    /// Number of connect attempts so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().urls.len()
    }

    /// URLs of every connect attempt so far.
    pub fn urls(&self) -> Vec<String> {
        self.lock().urls.clone()
    }

    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> Option<ServerConnection> {
        self.accepted_rx.recv().await
    }

    /// Returns an accepted connection if one is waiting.
    pub fn try_accept(&mut self) -> Option<ServerConnection> {
        self.accepted_rx.try_recv().ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Server end of one in-memory connection.
///
/// Dropping it makes the client observe an abnormal close.
pub struct ServerConnection {
    url: String,
    from_client: mpsc::UnboundedReceiver<TransportEvent>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerConnection {
    /// The URL the client connected with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pushes a text frame to the client. Returns `false` if the client
    /// end is gone.
    pub fn send_text(&self, text: &str) -> bool {
        self.to_client
            .send(TransportEvent::Frame(text.as_bytes().to_vec()))
            .is_ok()
    }

    /// Closes the connection from the server side with `code`.
    pub fn close(&self, code: CloseCode) {
        let _ = self.to_client.send(TransportEvent::Closed(code));
    }

    /// Waits for the next thing the client sent.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.from_client.recv().await
    }

    /// Returns the next thing the client sent, if already available.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.from_client.try_recv().ok()
    }

    /// Waits for the next data frame as UTF-8 text. Returns `None` on
    /// close.
    pub async fn recv_text(&mut self) -> Option<String> {
        match self.recv().await? {
            TransportEvent::Frame(data) => String::from_utf8(data).ok(),
            TransportEvent::Closed(_) => None,
        }
    }
}
