//! Connection manager actor.
//!
//! One Tokio task owns the transport halves, the send queue, the typing
//! throttle, the reconnect policy and the dispatcher. The outside world
//! talks to it through [`Command`]s on an mpsc channel, and watches
//! [`ConnectionStatus`] on a `watch` channel.
//!
//! Every wake-up source is a branch of one biased `tokio::select!`, in
//! this order:
//!
//! 1. the in-flight connect attempt finishing
//! 2. an inbound transport event
//! 3. the send-queue drain deadline
//! 4. the reconnect backoff deadline
//! 5. the next typing-indicator expiry
//! 6. a command from a [`ChatClient`](crate::ChatClient)
//!
//! Because each branch runs to completion before the next is polled, a
//! state transition is never interleaved with another. A backoff timer
//! that was cancelled by a manual connect is simply no longer a branch.

use std::sync::Arc;

use chatwire_dispatch::{Dispatcher, EventFilter, EventHandler, Subscription};
use chatwire_protocol::{
    ChannelId, Codec, EventKind, FrameContext, JsonCodec, OutboundIntent, timestamp_millis,
};
use chatwire_session::{ConversationState, SessionError};
use chatwire_throttle::{ReconnectPolicy, SendQueue, Throttle};
use chatwire_transport::{
    CloseCode, Connector, FrameReceiver, FrameSender, TransportError, TransportEvent,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::{
    ChatwireError, ClientConfig, ClientSnapshot, ConnectionState, ConnectionStatus, Fault,
};

type Reply<T> = oneshot::Sender<T>;

/// Requests from a client handle to the manager task.
pub(crate) enum Command {
    Connect {
        reply: Reply<Result<(), ChatwireError>>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    SetToken {
        token: String,
        reply: Reply<()>,
    },
    /// Any write: send, typing, stop typing, edit, delete.
    Write {
        intent: OutboundIntent,
        reply: Reply<Result<(), ChatwireError>>,
    },
    /// Membership has already been settled by the caller.
    Switch {
        conversation: ChannelId,
        reply: Reply<Result<ChannelId, ChatwireError>>,
    },
    Snapshot {
        reply: Reply<ClientSnapshot>,
    },
    Subscribe {
        filter: EventFilter,
        reply: Reply<Subscription>,
    },
    Handle {
        kind: EventKind,
        handler: Box<dyn EventHandler>,
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// A queued user message and the conversation it was written in.
#[derive(Debug)]
struct Queued {
    intent: OutboundIntent,
    channel: ChannelId,
}

type Attempt<C> = Result<
    (<C as Connector>::Sender, <C as Connector>::Receiver),
    TransportError,
>;

/// The manager task's state.
pub(crate) struct Manager<C: Connector> {
    connector: Arc<C>,
    codec: JsonCodec,
    config: ClientConfig,
    token: Option<String>,

    /// Present exactly while connected.
    sender: Option<C::Sender>,
    receiver: Option<C::Receiver>,
    /// The connect attempt in flight, if any.
    pending: Option<JoinHandle<Attempt<C>>>,
    reconnect_at: Option<Instant>,
    policy: ReconnectPolicy,

    queue: SendQueue<Queued>,
    typing_throttle: Throttle,
    dispatcher: Dispatcher<JsonCodec>,

    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::Receiver<Command>,
}

impl<C: Connector> Manager<C> {
    pub(crate) fn new(
        connector: C,
        config: ClientConfig,
        status: watch::Sender<ConnectionStatus>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let state = ConversationState::new(config.conversation.clone(), &config.session_config());
        Self {
            connector: Arc::new(connector),
            codec: JsonCodec,
            token: config.token.clone(),
            sender: None,
            receiver: None,
            pending: None,
            reconnect_at: None,
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            queue: SendQueue::new(config.send_interval),
            typing_throttle: Throttle::new(config.typing_throttle),
            dispatcher: Dispatcher::new(JsonCodec, config.username.clone(), state),
            config,
            status,
            commands,
        }
    }

    /// Runs until shut down or until every client handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(
            user = %self.config.username,
            conversation = %self.dispatcher.conversation(),
            "connection manager started"
        );

        if let Err(e) = self.start_connect("initial").await {
            warn!(error = %e, "not connecting");
            self.publish(ConnectionState::Disconnected, None);
        }

        loop {
            tokio::select! {
                // Traffic the server already delivered is handled before
                // newer commands, so a command observes its effects.
                biased;

                result = join_pending(&mut self.pending) => {
                    self.pending = None;
                    self.on_attempt_finished(result).await;
                }
                event = recv_inbound(&mut self.receiver) => {
                    self.on_inbound(event).await;
                }
                _ = sleep_opt(self.queue.next_drain_at()) => {
                    self.drain_queue().await;
                }
                _ = sleep_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    if let Err(e) = self.start_connect("backoff").await {
                        warn!(error = %e, "reconnect abandoned");
                        self.publish(ConnectionState::Disconnected, None);
                    }
                }
                _ = sleep_opt(self.dispatcher.next_typing_expiry()) => {
                    self.dispatcher.expire_typing(Instant::now());
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { reply } => {
                self.policy.reset();
                let result = self.start_connect("manual").await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                info!("disconnecting on request");
                self.stop_connection().await;
                self.publish(ConnectionState::Disconnected, None);
                let _ = reply.send(());
            }
            Command::SetToken { token, reply } => {
                self.token = Some(token).filter(|t| !t.is_empty());
                debug!(present = self.token.is_some(), "token updated");
                let _ = reply.send(());
            }
            Command::Write { intent, reply } => {
                let result = self.write(intent).await;
                let _ = reply.send(result);
            }
            Command::Switch {
                conversation,
                reply,
            } => {
                let result = self.switch(conversation).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Subscribe { filter, reply } => {
                let _ = reply.send(self.dispatcher.subscribe(filter));
            }
            Command::Handle {
                kind,
                handler,
                reply,
            } => {
                self.dispatcher.on_boxed(kind, handler);
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                // Handled in the loop; kept exhaustive.
                let _ = reply.send(());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Starts a fresh connect attempt, replacing any previous connection,
    /// attempt or backoff timer.
    async fn start_connect(&mut self, reason: &'static str) -> Result<(), ChatwireError> {
        let Some(token) = self.token.clone() else {
            return Err(ChatwireError::InvalidConfig("no bearer token".into()));
        };
        if self.dispatcher.conversation().is_empty() {
            return Err(ChatwireError::InvalidConfig("conversation id is empty".into()));
        }
        let url = self.config.connection_url(&token)?;

        self.stop_connection().await;

        let connector = Arc::clone(&self.connector);
        self.pending = Some(tokio::spawn(async move { connector.connect(&url).await }));
        info!(reason, attempt = self.policy.attempts(), "connecting");
        self.publish(ConnectionState::Connecting, None);
        Ok(())
    }

    async fn on_attempt_finished(&mut self, result: Result<Attempt<C>, JoinError>) {
        let attempt = match result {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(error = %e, "connect task failed");
                self.schedule_reconnect(ConnectionState::Error, Fault::Transport(e.to_string()));
                return;
            }
        };

        match attempt {
            Ok((sender, receiver)) => {
                self.sender = Some(sender);
                self.receiver = Some(receiver);
                self.policy.reset();
                info!(conversation = %self.dispatcher.conversation(), "connected");
                self.publish(ConnectionState::Connected, None);
                self.send_join().await;
            }
            Err(e) if e.is_unauthorized() => {
                self.auth_rejected(&e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.schedule_reconnect(ConnectionState::Error, Fault::Transport(e.to_string()));
            }
        }
    }

    /// The handshake. Bypasses the send queue.
    async fn send_join(&mut self) {
        let conversation = self.dispatcher.conversation().clone();
        let intent = OutboundIntent::Join {
            conversation: conversation.clone(),
        };
        if let Err(e) = self.transmit(intent, conversation).await {
            debug!(error = %e, "join handshake not delivered");
        }
    }

    async fn on_inbound(&mut self, event: Result<TransportEvent, TransportError>) {
        match event {
            Ok(TransportEvent::Frame(data)) => {
                let outcome = self.dispatcher.dispatch(&data, Instant::now());
                trace!(?outcome, "frame processed");
            }
            Ok(TransportEvent::Closed(code)) => self.on_closed(code),
            Err(e) => {
                warn!(error = %e, "receive failed");
                self.connection_lost(Fault::Transport(e.to_string()));
            }
        }
    }

    fn on_closed(&mut self, code: CloseCode) {
        if code.is_intentional() {
            info!(%code, "server closed the connection");
            self.drop_connection();
            self.publish(ConnectionState::Disconnected, None);
        } else if code.is_auth_rejection() {
            self.drop_connection();
            self.auth_rejected(&format!("closed with {code}"));
        } else {
            warn!(%code, "connection closed abnormally");
            self.connection_lost(Fault::Transport(format!("closed with {code}")));
        }
    }

    /// Abnormal loss: forget the connection and back off.
    fn connection_lost(&mut self, fault: Fault) {
        self.drop_connection();
        self.schedule_reconnect(ConnectionState::Disconnected, fault);
    }

    fn auth_rejected(&mut self, reason: &str) {
        warn!(reason, "token rejected, not retrying");
        self.token = None;
        self.reconnect_at = None;
        self.publish(ConnectionState::Error, Some(Fault::AuthRejected));
    }

    fn schedule_reconnect(&mut self, state: ConnectionState, fault: Fault) {
        match self.policy.next_delay() {
            Some(delay) => {
                self.reconnect_at = Some(Instant::now() + delay);
                info!(
                    attempt = self.policy.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
                self.publish(state, Some(fault));
            }
            None => {
                warn!(
                    attempts = self.policy.attempts(),
                    last = %fault,
                    "reconnect attempts exhausted"
                );
                self.reconnect_at = None;
                self.publish(ConnectionState::Error, Some(Fault::ReconnectExhausted));
            }
        }
    }

    /// Forgets the transport halves and everything scoped to them. Used
    /// when the peer is already gone.
    fn drop_connection(&mut self) {
        self.sender = None;
        self.receiver = None;
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(dropped, "queued messages discarded with the connection");
        }
        self.typing_throttle.reset();
        self.dispatcher.connection_lost(Instant::now());
    }

    /// Cancels every timer and attempt, and closes an open connection
    /// with the normal close code.
    async fn stop_connection(&mut self) {
        self.reconnect_at = None;
        if let Some(pending) = self.pending.take() {
            pending.abort();
            debug!("in-flight connect attempt aborted");
        }
        if let Some(mut sender) = self.sender.take() {
            if let Err(e) = sender.close(CloseCode::NORMAL).await {
                debug!(error = %e, "close on a dead connection");
            }
        }
        self.drop_connection();
    }

    async fn teardown(&mut self) {
        self.stop_connection().await;
        self.dispatcher.close();
        self.publish(ConnectionState::Disconnected, None);
        info!("connection manager stopped");
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    async fn write(&mut self, intent: OutboundIntent) -> Result<(), ChatwireError> {
        if self.sender.is_none() {
            return Err(ChatwireError::NotConnected);
        }
        let now = Instant::now();
        let channel = self.dispatcher.conversation().clone();

        // The typing window only restarts with a new transport; a stop
        // in between does not reopen it.
        match intent {
            OutboundIntent::Typing if !self.typing_throttle.try_acquire(now) => {
                trace!("typing notification throttled");
                Ok(())
            }
            intent if intent.is_rate_limited() => {
                match self.queue.enqueue(Queued { intent, channel }, now) {
                    Some(Queued { intent, channel }) => self.transmit(intent, channel).await,
                    None => Ok(()),
                }
            }
            intent => self.transmit(intent, channel).await,
        }
    }

    async fn drain_queue(&mut self) {
        let Some(Queued { intent, channel }) = self.queue.drain_due(Instant::now()) else {
            return;
        };
        if let Err(e) = self.transmit(intent, channel).await {
            debug!(error = %e, "queued message not delivered");
        }
    }

    /// Encodes and writes one frame. A failed write is treated as a lost
    /// connection.
    async fn transmit(
        &mut self,
        intent: OutboundIntent,
        channel: ChannelId,
    ) -> Result<(), ChatwireError> {
        let name = intent.name();
        let ctx = FrameContext {
            username: self.config.username.clone(),
            channel,
            timestamp: timestamp_millis(),
        };
        let data = self.codec.encode(&intent.into_frame(&ctx))?;
        let Some(sender) = self.sender.as_mut() else {
            return Err(ChatwireError::NotConnected);
        };
        match sender.send(data).await {
            Ok(()) => {
                debug!(intent = name, "frame sent");
                Ok(())
            }
            Err(e) => {
                warn!(intent = name, error = %e, "send failed");
                self.connection_lost(Fault::Transport(e.to_string()));
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Conversation switch
    // -----------------------------------------------------------------------

    /// Clears local state and re-routes the existing connection. Returns
    /// the previous conversation.
    async fn switch(&mut self, next: ChannelId) -> Result<ChannelId, ChatwireError> {
        if next.is_empty() {
            return Err(SessionError::EmptyConversation.into());
        }
        if *self.dispatcher.conversation() == next {
            debug!(conversation = %next, "already in conversation");
            return Ok(next);
        }

        let now = Instant::now();
        let from = self.dispatcher.switch_conversation(next.clone(), now);
        info!(%from, to = %next, "conversation switched");

        if self.sender.is_some() {
            let intent = OutboundIntent::SwitchConversation {
                new_id: next.clone(),
            };
            if let Err(e) = self.transmit(intent, next).await {
                // The next join after reconnecting routes to the new id.
                debug!(error = %e, "switch frame not delivered");
            }
        }
        Ok(from)
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    fn publish(&self, state: ConnectionState, fault: Option<Fault>) {
        let status = ConnectionStatus {
            state,
            fault,
            attempts: self.policy.attempts(),
            reconnect_scheduled: self.reconnect_at.is_some(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!(state = %status.state, fault = ?status.fault, "status changed");
            *current = status;
            true
        });
    }

    fn snapshot(&self) -> ClientSnapshot {
        let conversation = self.dispatcher.state().snapshot(Instant::now());
        ClientSnapshot {
            conversation: conversation.conversation,
            status: self.status.borrow().clone(),
            typing: conversation.typing,
            presence: conversation.presence,
        }
    }
}

// ---------------------------------------------------------------------------
// select! helpers: each pends forever when there is nothing to wait for.
// ---------------------------------------------------------------------------

async fn join_pending<T>(pending: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn recv_inbound<R: FrameReceiver>(
    receiver: &mut Option<R>,
) -> Result<TransportEvent, TransportError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
