//! Observer handles and delivery outcomes.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::hub::BroadcastHub;

/// A pre-serialised JSON message, shared by every observer of one broadcast.
pub type Frame = Arc<str>;

/// Handle identifying one registration in the hub.
///
/// Ids are never reused, so a removed observer can only come back through a
/// fresh registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// Why a frame could not be handed to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The observer's receiving side is gone.
    Closed,
    /// The observer's queue stayed full for the whole send timeout.
    TimedOut,
}

impl DeliveryFailure {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered observer queue together with its registration.
///
/// Dropping the connection unregisters it, so a transport task that ends for
/// any reason leaves the active set without an explicit control message.
pub struct ObserverConnection {
    id: ObserverId,
    frames: mpsc::Receiver<Frame>,
    _registration: Registration,
}

impl ObserverConnection {
    pub(crate) fn new(hub: Arc<BroadcastHub>, id: ObserverId, frames: mpsc::Receiver<Frame>) -> Self {
        Self {
            id,
            frames,
            _registration: Registration { hub, id },
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next frame, or `None` once the hub has dropped this observer.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Non-blocking receive, for draining.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }
}

impl fmt::Debug for ObserverConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

struct Registration {
    hub: Arc<BroadcastHub>,
    id: ObserverId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
