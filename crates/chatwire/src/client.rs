//! `ChatClient` handle and its builder.
//!
//! The handle is the client's only write surface. Each method sends a
//! command to the connection manager task and waits for its reply, so a
//! returned `Ok` means the manager has accepted the operation.

use std::sync::Arc;
use std::time::Duration;

use chatwire_dispatch::{EventFilter, EventHandler, Subscription};
use chatwire_protocol::{ChannelId, EventKind, MessageId, OutboundIntent, Username};
use chatwire_session::{Membership, OpenMembership, SessionError};
use chatwire_throttle::ReconnectConfig;
use chatwire_transport::Connector;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::manager::{Command, Manager};
use crate::{ChatwireError, ClientConfig, ClientSnapshot, ConnectionState, ConnectionStatus};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a [`ChatClient`].
///
/// # Example
///
/// ```rust,ignore
/// use chatwire::prelude::*;
///
/// let client = ChatClient::builder()
///     .url("wss://chat.example.com/ws")
///     .username("alice")
///     .token(token)
///     .conversation("general")
///     .build(WebSocketConnector, OpenMembership)
///     .await?;
/// client.send("hello", None).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatClientBuilder {
    config: ClientConfig,
}

impl ChatClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Username::new(username);
        self
    }

    /// Sets the bearer token sent when connecting.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Sets the conversation joined on connect.
    pub fn conversation(mut self, conversation: impl Into<String>) -> Self {
        self.config.conversation = ChannelId::new(conversation);
        self
    }

    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.config.send_interval = interval;
        self
    }

    pub fn typing_throttle(mut self, period: Duration) -> Self {
        self.config.typing_throttle = period;
        self
    }

    pub fn typing_ttl(mut self, ttl: Duration) -> Self {
        self.config.typing_ttl = ttl;
        self
    }

    pub fn join_window(mut self, size: usize) -> Self {
        self.config.join_window = size;
        self
    }

    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and spawns the connection manager.
    ///
    /// If a token and a conversation are configured, the first connect
    /// attempt starts right away. Otherwise the client starts
    /// `Disconnected` and [`ChatClient::connect`] reports what is missing.
    ///
    /// # Errors
    /// `ChatwireError::InvalidConfig` for an empty username or a bad URL.
    pub async fn build<C, M>(
        self,
        connector: C,
        membership: M,
    ) -> Result<ChatClient<M>, ChatwireError>
    where
        C: Connector,
        M: Membership,
    {
        let config = self.config.validated();
        config.check()?;

        let ready = config.token.is_some() && !config.conversation.is_empty();
        let initial = if ready {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        };
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::new(initial));
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let username = config.username.clone();

        let manager = Manager::new(connector, config, status_tx, cmd_rx);
        tokio::spawn(manager.run());

        Ok(ChatClient {
            commands: cmd_tx,
            status: status_rx,
            membership: Arc::new(membership),
            username,
        })
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Handle to a running chat session.
///
/// Cheap to clone. The session ends when [`shutdown`](Self::shutdown) is
/// called or the last clone is dropped; either way every timer is
/// cancelled, the connection is closed with code 1000, and all
/// subscriptions end.
pub struct ChatClient<M: Membership = OpenMembership> {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    membership: Arc<M>,
    username: Username,
}

impl<M: Membership> Clone for ChatClient<M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            status: self.status.clone(),
            membership: Arc::clone(&self.membership),
            username: self.username.clone(),
        }
    }
}

impl ChatClient {
    /// Creates a new builder.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }
}

impl<M: Membership> ChatClient<M> {
    /// The local user.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// The latest connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// A receiver that wakes on every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Starts a new connection attempt with a fresh reconnect budget.
    ///
    /// Any open connection, in-flight attempt or pending backoff timer is
    /// replaced. Use this after a terminal `Error` or a manual
    /// [`disconnect`](Self::disconnect).
    ///
    /// # Errors
    /// `ChatwireError::InvalidConfig` if there is no token (for instance
    /// because the last one was rejected) or no conversation.
    pub async fn connect(&self) -> Result<(), ChatwireError> {
        self.request(|reply| Command::Connect { reply }).await?
    }

    /// Closes the connection intentionally. No reconnect follows.
    pub async fn disconnect(&self) -> Result<(), ChatwireError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Replaces the bearer token used by the next connect.
    pub async fn set_token(&self, token: impl Into<String>) -> Result<(), ChatwireError> {
        let token = token.into();
        self.request(|reply| Command::SetToken { token, reply }).await
    }

    /// Posts a message to the current conversation.
    ///
    /// Messages are spaced at least `send_interval` apart, in call order.
    /// Returns the locally generated id the server will echo back.
    ///
    /// # Errors
    /// `ChatwireError::NotConnected` unless the status is `Connected`.
    pub async fn send(
        &self,
        body: impl Into<String>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChatwireError> {
        let id = MessageId::generate();
        self.write(OutboundIntent::Send {
            id: id.clone(),
            body: body.into(),
            reply_to,
        })
        .await?;
        Ok(id)
    }

    /// Announces that the local user is typing. Calls inside the typing
    /// throttle window are dropped silently.
    pub async fn send_typing(&self) -> Result<(), ChatwireError> {
        self.write(OutboundIntent::Typing).await
    }

    pub async fn send_stop_typing(&self) -> Result<(), ChatwireError> {
        self.write(OutboundIntent::StopTyping).await
    }

    pub async fn edit_message(
        &self,
        id: MessageId,
        body: impl Into<String>,
    ) -> Result<(), ChatwireError> {
        self.write(OutboundIntent::EditMessage {
            id,
            body: body.into(),
        })
        .await
    }

    pub async fn delete_message(&self, id: MessageId) -> Result<(), ChatwireError> {
        self.write(OutboundIntent::DeleteMessage { id }).await
    }

    /// Moves the session to `conversation`.
    ///
    /// Membership is settled first: if the local user is not a member the
    /// roster is asked to join. If that fails nothing changes and the
    /// error is returned. Otherwise typing and presence are cleared,
    /// subscribers get `Update::ConversationSwitched`, and the existing
    /// connection is re-routed. Returns the previous conversation.
    ///
    /// While disconnected only the local scope changes; the next join
    /// uses the new id.
    pub async fn switch_conversation(
        &self,
        conversation: impl Into<String>,
    ) -> Result<ChannelId, ChatwireError> {
        let conversation = ChannelId::new(conversation);
        if conversation.is_empty() {
            return Err(SessionError::EmptyConversation.into());
        }
        if !self
            .membership
            .is_member(&self.username, &conversation)
            .await?
        {
            info!(%conversation, "not a member, joining");
            self.membership
                .join(&self.username, &conversation)
                .await?;
        }
        self.request(|reply| Command::Switch {
            conversation,
            reply,
        })
        .await?
    }

    /// Conversation, status, typing set and presence list as of now.
    pub async fn snapshot(&self) -> Result<ClientSnapshot, ChatwireError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Subscribes to inbound events and state changes.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes.
    /// Keep reading it: once `Registry::CAPACITY` updates are buffered,
    /// newer ones are dropped until the subscriber catches up.
    pub async fn subscribe(&self, filter: EventFilter) -> Result<Subscription, ChatwireError> {
        self.request(|reply| Command::Subscribe { filter, reply })
            .await
    }

    /// Registers the handler for one event tag, replacing any previous
    /// one. Handlers run on the manager task and must not block.
    pub async fn on<H>(&self, kind: EventKind, handler: H) -> Result<(), ChatwireError>
    where
        H: EventHandler + 'static,
    {
        let handler: Box<dyn EventHandler> = Box::new(handler);
        self.request(|reply| Command::Handle {
            kind,
            handler,
            reply,
        })
        .await
    }

    /// Ends the session and waits for teardown to finish.
    pub async fn shutdown(self) -> Result<(), ChatwireError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn write(&self, intent: OutboundIntent) -> Result<(), ChatwireError> {
        self.request(|reply| Command::Write { intent, reply })
            .await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ChatwireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| ChatwireError::ClientClosed)?;
        reply_rx.await.map_err(|_| ChatwireError::ClientClosed)
    }
}

impl<M: Membership> std::fmt::Debug for ChatClient<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("username", &self.username)
            .field("status", &*self.status.borrow())
            .finish()
    }
}
