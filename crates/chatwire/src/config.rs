//! Client configuration.

use std::time::Duration;

use chatwire_protocol::{ChannelId, Username};
use chatwire_session::{RecentJoins, SessionConfig, TypingTracker};
use chatwire_throttle::{ReconnectConfig, SendQueue, Throttle};
use tracing::warn;
use url::Url;

use crate::ChatwireError;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything the connection manager needs to know up front.
///
/// Usually filled in through [`ChatClientBuilder`](crate::ChatClientBuilder)
/// rather than by hand.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `wss://chat.example.com/ws`. The bearer token
    /// is appended as a `token` query parameter.
    pub url: String,

    /// The local user's identity, stamped on outbound frames.
    pub username: Username,

    /// Bearer token. Without one no connection is attempted.
    pub token: Option<String>,

    /// The conversation joined on every (re)connect.
    pub conversation: ChannelId,

    /// Minimum spacing between user messages. Default: 500 ms.
    pub send_interval: Duration,

    /// At most one typing-start notification per window. Default: 1000 ms.
    pub typing_throttle: Duration,

    /// How long someone else's typing indicator lasts. Default: 3000 ms.
    pub typing_ttl: Duration,

    /// Trailing window for join de-duplication. Default: 10.
    pub join_window: usize,

    /// Reconnect backoff.
    pub reconnect: ReconnectConfig,

    /// Capacity of the command channel into the manager task.
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            username: Username::new(""),
            token: None,
            conversation: ChannelId::new(""),
            send_interval: SendQueue::<()>::DEFAULT_INTERVAL,
            typing_throttle: Throttle::TYPING_PERIOD,
            typing_ttl: TypingTracker::DEFAULT_TTL,
            join_window: RecentJoins::DEFAULT_CAPACITY,
            reconnect: ReconnectConfig::default(),
            command_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Clamps values that would break the manager.
    ///
    /// - An empty token string becomes `None`.
    /// - `typing_ttl` of zero falls back to the default.
    /// - `typing_ttl`, `send_interval` and reconnect delays are capped at
    ///   one day.
    /// - `join_window` and `command_buffer` are at least 1.
    pub fn validated(mut self) -> Self {
        if self.token.as_deref().is_some_and(str::is_empty) {
            self.token = None;
        }
        if self.typing_ttl.is_zero() {
            warn!("typing_ttl is zero, using default");
            self.typing_ttl = TypingTracker::DEFAULT_TTL;
        }
        if self.typing_ttl > TypingTracker::MAX_TTL {
            warn!("typing_ttl too large, clamping to one day");
            self.typing_ttl = TypingTracker::MAX_TTL;
        }
        if self.send_interval > SendQueue::<()>::MAX_INTERVAL {
            warn!("send_interval too large, clamping to one day");
            self.send_interval = SendQueue::<()>::MAX_INTERVAL;
        }
        if self.join_window == 0 {
            warn!("join_window is zero, using 1");
            self.join_window = 1;
        }
        if self.command_buffer == 0 {
            self.command_buffer = 1;
        }
        self.reconnect = self.reconnect.validated();
        self
    }

    /// Checks the parts that can never become valid at runtime.
    ///
    /// # Errors
    /// `ChatwireError::InvalidConfig` for an empty username or an
    /// unparsable URL.
    pub fn check(&self) -> Result<(), ChatwireError> {
        if self.username.as_str().trim().is_empty() {
            return Err(ChatwireError::InvalidConfig("username is empty".into()));
        }
        self.parse_url().map(|_| ())
    }

    /// The URL to connect with: the endpoint plus `token=<token>`.
    ///
    /// # Errors
    /// `ChatwireError::InvalidConfig` if the endpoint does not parse.
    pub fn connection_url(&self, token: &str) -> Result<String, ChatwireError> {
        let mut url = self.parse_url()?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.to_string())
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            typing_ttl: self.typing_ttl,
            join_window: self.join_window,
        }
    }

    fn parse_url(&self) -> Result<Url, ChatwireError> {
        Url::parse(&self.url).map_err(|e| {
            ChatwireError::InvalidConfig(format!("bad server url {:?}: {e}", self.url))
        })
    }
}
