//! Shared fixtures for the client integration tests.
//!
//! Every test runs the real connection manager against the in-memory
//! transport, on a paused Tokio clock so backoff and pacing deadlines
//! can be asserted to the millisecond.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chatwire::prelude::*;
use chatwire_transport::{TransportError, TransportEvent};
use chatwire_transport::memory::{self, MemoryServer, ServerConnection};
use serde_json::Value;

pub const URL: &str = "ws://chat.test/ws";

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn builder() -> ChatClientBuilder {
    ChatClient::builder()
        .url(URL)
        .username("alice")
        .token("t0k")
        .conversation("general")
}

/// Builds a client and the server side of its transport. The first
/// connect attempt is already under way.
pub async fn start_with<M: Membership>(
    builder: ChatClientBuilder,
    membership: M,
) -> (ChatClient<M>, MemoryServer) {
    let (connector, server) = memory::pair();
    let client = builder
        .build(connector, membership)
        .await
        .expect("client should build");
    (client, server)
}

/// Builds a default client, accepts its connection and consumes the join
/// handshake.
pub async fn connected() -> (ChatClient, MemoryServer, ServerConnection) {
    let (client, mut server) = start_with(builder(), OpenMembership).await;
    let mut conn = server.accept().await.expect("should connect");
    let join = next_frame(&mut conn).await;
    assert_eq!(join["type"], "join");
    wait_status(&client, |s| s.is_connected()).await;
    (client, server, conn)
}

/// Next data frame the client sent, as JSON.
pub async fn next_frame(conn: &mut ServerConnection) -> Value {
    let text = conn.recv_text().await.expect("client should send a frame");
    serde_json::from_str(&text).expect("client frames are JSON")
}

/// The `type` of every frame the client has already sent, oldest first.
pub fn sent_types(conn: &mut ServerConnection) -> Vec<String> {
    std::iter::from_fn(|| conn.try_recv())
        .filter_map(|event| match event {
            TransportEvent::Frame(data) => serde_json::from_slice::<Value>(&data).ok(),
            TransportEvent::Closed(_) => None,
        })
        .map(|frame| frame["type"].as_str().unwrap_or_default().to_owned())
        .collect()
}

/// Waits until the published status satisfies `f`.
pub async fn wait_status<M: Membership>(
    client: &ChatClient<M>,
    f: impl FnMut(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let mut rx = client.watch_status();
    let status = rx.wait_for(f).await.expect("manager alive").clone();
    status
}

pub fn push(conn: &ServerConnection, value: Value) {
    assert!(conn.send_text(&value.to_string()), "client end is gone");
}

pub fn refused() -> TransportError {
    TransportError::ConnectFailed(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "server down",
    ))
}

/// A roster where the user belongs to "general" only. Joining "staff"
/// is refused; joining anything else succeeds and is counted.
#[derive(Clone, Default)]
pub struct Roster {
    pub joins: Arc<AtomicUsize>,
}

impl Roster {
    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }
}

impl Membership for Roster {
    async fn is_member(
        &self,
        _user: &Username,
        conversation: &ChannelId,
    ) -> Result<bool, SessionError> {
        Ok(conversation.as_str() == "general")
    }

    async fn join(&self, _user: &Username, conversation: &ChannelId) -> Result<(), SessionError> {
        if conversation.as_str() == "staff" {
            return Err(SessionError::JoinFailed {
                conversation: conversation.clone(),
                reason: "invite only".into(),
            });
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
