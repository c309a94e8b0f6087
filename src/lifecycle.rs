//! Connection slot state machine
//!
//! `Unconnected → Connecting → Connected → Closing → Unconnected`, driven by
//! discrete events. A transition that drops a live resource hands it back to
//! the caller, who is responsible for ending it outside the lock.

use std::sync::Arc;

use crate::driver::DriverPool;
use crate::handle::ConnectionHandle;

/// Observable state of the manager's connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing held
    Unconnected,
    /// A single connection is being established
    Connecting,
    /// A single connection or a pool is held
    Connected,
    /// The held resource is being ended
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconnected => write!(f, "unconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Resource owned by the slot.
#[derive(Clone)]
pub(crate) enum Held {
    Connection(ConnectionHandle),
    Pool(Arc<dyn DriverPool>),
}

impl std::fmt::Debug for Held {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(handle) => f.debug_tuple("Connection").field(handle).finish(),
            Self::Pool(_) => f.debug_tuple("Pool").field(&"<DriverPool>").finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum LifecycleEvent {
    ConnectStarted,
    ConnectSucceeded(Held),
    ConnectFailed,
    /// Fatal error reported for the connection with this id
    DriverError(u64),
    /// The connection with this id was ended by the driver
    DriverEnd(u64),
    CloseRequested,
    CloseCompleted,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Unconnected,
    Connecting,
    Connected(Held),
    Closing,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    slot: Slot,
}

impl Lifecycle {
    pub(crate) fn state(&self) -> ConnectionState {
        match self.slot {
            Slot::Unconnected => ConnectionState::Unconnected,
            Slot::Connecting => ConnectionState::Connecting,
            Slot::Connected(_) => ConnectionState::Connected,
            Slot::Closing => ConnectionState::Closing,
        }
    }

    pub(crate) fn held(&self) -> Option<&Held> {
        match &self.slot {
            Slot::Connected(held) => Some(held),
            _ => None,
        }
    }

    /// Apply an event. Returns a resource that left the slot and must be
    /// ended by the caller. Events that do not apply to the current state
    /// (e.g. an `End` for a connection already replaced) are ignored.
    pub(crate) fn apply(&mut self, event: LifecycleEvent) -> Option<Held> {
        let before = self.state();
        let slot = std::mem::take(&mut self.slot);
        let (next, released) = match (slot, event) {
            (Slot::Connected(held), LifecycleEvent::ConnectStarted) => {
                (Slot::Connected(held), None)
            }
            (_, LifecycleEvent::ConnectStarted) => (Slot::Connecting, None),

            (Slot::Connected(old), LifecycleEvent::ConnectSucceeded(held)) => {
                (Slot::Connected(held), Some(old))
            }
            (_, LifecycleEvent::ConnectSucceeded(held)) => (Slot::Connected(held), None),

            (Slot::Connecting, LifecycleEvent::ConnectFailed) => (Slot::Unconnected, None),

            (Slot::Connected(Held::Connection(handle)), LifecycleEvent::DriverError(id))
                if handle.id() == id =>
            {
                (Slot::Closing, Some(Held::Connection(handle)))
            }
            (Slot::Connected(Held::Connection(handle)), LifecycleEvent::DriverEnd(id))
                if handle.id() == id =>
            {
                (Slot::Unconnected, None)
            }

            (Slot::Connected(held), LifecycleEvent::CloseRequested) => (Slot::Closing, Some(held)),
            (Slot::Closing, LifecycleEvent::CloseCompleted) => (Slot::Unconnected, None),

            (slot, event) => {
                tracing::trace!(state = %before, ?event, "lifecycle event ignored");
                (slot, None)
            }
        };
        self.slot = next;
        let after = self.state();
        if before != after {
            tracing::debug!(from = %before, to = %after, "connection state changed");
        }
        released
    }
}
