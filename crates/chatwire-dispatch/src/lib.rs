//! Inbound event routing for Chatwire.
//!
//! The [`Dispatcher`] takes raw frames off the connection, decodes them,
//! keeps the conversation's ephemeral state (typing, presence) in step,
//! and then hands each event to:
//!
//! 1. the one [`EventHandler`] registered for its tag, and
//! 2. every live [`Subscription`] whose [`EventFilter`] matches.
//!
//! A frame that fails to decode, or carries a tag this client does not
//! know, is logged and dropped. The next frame is processed normally.
//!
//! Subscriptions are owned by the [`Registry`] of one client session, not
//! by a process-wide map. Dropping a `Subscription` removes it; closing the
//! registry ends every subscription at once.

mod dispatcher;
mod handler;
mod registry;

pub use dispatcher::{Dispatcher, Outcome};
pub use handler::EventHandler;
pub use registry::{EventFilter, Registry, Subscription, Update};
