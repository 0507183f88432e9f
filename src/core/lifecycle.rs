//! Initialization state machine (component E), shared by client and server
//! connection objects. Encodes the transition table from §4.E: version
//! negotiation on `initialize`, the `Active` barrier at `initialized`, and
//! the terminal `Closed` state on failure or teardown.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Initializing = 1,
    Active = 2,
    Closed = 3,
}

impl LifecycleState {
    fn from_u8(v: u8) -> LifecycleState {
        match v {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Active,
            _ => LifecycleState::Closed,
        }
    }
}

/// An atomically-readable lifecycle state, shared between the read loop and
/// whichever task drives the handshake.
#[derive(Debug, Default)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle(AtomicU8::new(LifecycleState::Uninitialized as u8))
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// True once `initialized` has landed and the peer may service requests
    /// beyond `initialize`/`ping`.
    pub fn is_active(&self) -> bool {
        self.get() == LifecycleState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.get() == LifecycleState::Closed
    }

    /// Whether an inbound method may be serviced in the current state. Only
    /// `initialize` and `ping` are permitted before `Active`, per §4.E's
    /// invariant list.
    pub fn permits(&self, method: &str) -> bool {
        match self.get() {
            LifecycleState::Active => true,
            LifecycleState::Closed => false,
            LifecycleState::Uninitialized | LifecycleState::Initializing => {
                method == crate::protocol::methods::INITIALIZE || method == crate::protocol::methods::PING
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::methods as m;

    #[test]
    fn only_initialize_and_ping_permitted_before_active() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.permits(m::INITIALIZE));
        assert!(lifecycle.permits(m::PING));
        assert!(!lifecycle.permits(m::TOOLS_LIST));
    }

    #[test]
    fn everything_permitted_once_active() {
        let lifecycle = Lifecycle::new();
        lifecycle.set(LifecycleState::Active);
        assert!(lifecycle.permits(m::TOOLS_LIST));
    }

    #[test]
    fn nothing_permitted_once_closed() {
        let lifecycle = Lifecycle::new();
        lifecycle.set(LifecycleState::Closed);
        assert!(!lifecycle.permits(m::PING));
    }
}
