//! Outbound pacing for Chatwire.
//!
//! Three small clocks that the connection manager consults:
//!
//! - [`SendQueue`]: FIFO of user messages drained at most once per
//!   interval (500 ms by default).
//! - [`Throttle`]: drops repeats inside a window; used for typing-start
//!   notifications (1000 ms).
//! - [`ReconnectPolicy`]: bounded exponential backoff between reconnect
//!   attempts.
//!
//! None of them sleep. They take the current [`Instant`] and return the
//! next deadline, so the owner can put that deadline in its own
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* may call queue.enqueue(..) */ }
//!         _ = sleep_until_opt(queue.next_drain_at()) => {
//!             if let Some(frame) = queue.drain_due(Instant::now()) {
//!                 transmit(frame).await;
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! [`Instant`]: tokio::time::Instant

mod backoff;
mod queue;
mod throttle;

pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use queue::SendQueue;
pub use throttle::Throttle;
