//! Real-time fan-out of patrol update events.
//!
//! The hub keeps the set of live observers and relays each event to all of
//! them. Every observer owns a bounded queue; a broadcast only ever waits
//! `send_timeout` on a full queue before giving up on that observer, so one
//! stalled observer cannot hold back producers or the other observers.
//!
//! ```text
//!  UpdatePipeline ──broadcast()──▶ BroadcastHub
//!                                   │ snapshot of active set
//!                     ┌─────────────┼─────────────┐
//!                     ▼             ▼             ▼
//!                 [queue 1]     [queue 2]     [queue 3]   bounded mpsc
//!                     │             │             │
//!                  writer        writer        writer     one task per connection
//!                     ▼             ▼             ▼
//!                  socket        socket        socket
//! ```
//!
//! A failed delivery (queue closed, or full past the timeout) removes the
//! observer in the same broadcast pass. The failure is reported in the
//! returned `BroadcastReport`, never raised to the caller.

mod config;
mod error;
mod hub;
mod observer;

pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use hub::{BroadcastHub, BroadcastReport};
pub use observer::{DeliveryFailure, Frame, ObserverConnection, ObserverId};
