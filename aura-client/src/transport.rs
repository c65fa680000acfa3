//! Request channels.
use crate::ActionRef;
use std::cell::Cell;

/// Request lane. Each lane has at most one request in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Boxcarred batches of server actions.
    Foreground,
    /// One action per request.
    Background,
}

/// Sends batches of actions to the server.
///
/// Completion is reported back through [`ClientService::receive`](crate::ClientService::receive).
pub trait Transport {
    fn send(&self, actions: Vec<ActionRef>, channel: Channel);
}

/// In-flight guard of a channel.
#[derive(Default, Debug)]
pub struct RequestSlot {
    in_flight: Cell<bool>,
}

impl RequestSlot {
    pub fn new() -> RequestSlot {
        RequestSlot::default()
    }

    /// Reserves the slot. Returns false if a request is already in flight.
    pub fn start(&self) -> bool {
        !self.in_flight.replace(true)
    }

    /// Releases a slot reserved with `start` that ended up not being used.
    pub fn cancel(&self) {
        self.in_flight.set(false);
    }

    /// Releases the slot once the response has arrived.
    pub fn finish(&self) {
        self.in_flight.set(false);
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight.get()
    }
}
