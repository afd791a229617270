//! Paid-invoice notifications.
//!
//! Components that change invoice state publish events through [`EventProducers`]. Consumers register async hooks via
//! [`EventHooks`], which [`EventHandlers`] runs in the background.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
