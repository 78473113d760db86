//! The network session ("face") abstraction.
//!
//! A face sends interests, delivers the matching data or a timeout/nack
//! through callbacks, and hands incoming interests for registered prefixes to
//! the application together with a [`ReplyChannel`].
//!
//! Faces are single-threaded: all callbacks run on the thread that drives the
//! face's event loop, so callback types are `Rc` rather than `Arc`.

use std::rc::Rc;
use std::time::Instant;

use cnl_core::{Data, Interest, Name};

use crate::error::Result;

/// Why the network refused an interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

/// A network-level rejection of an interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkNack {
    pub reason: NackReason,
}

impl NetworkNack {
    pub fn new(reason: NackReason) -> Self {
        Self { reason }
    }
}

pub type OnData = Rc<dyn Fn(&Interest, &Data)>;
pub type OnTimeout = Rc<dyn Fn(&Interest)>;
pub type OnNack = Rc<dyn Fn(&Interest, &NetworkNack)>;
/// `(registered prefix, interest, reply channel, registration id)`
pub type OnInterest = Rc<dyn Fn(&Name, &Interest, Rc<dyn ReplyChannel>, u64)>;
pub type OnRegisterFailed = Rc<dyn Fn(&Name)>;
pub type OnRegisterSuccess = Rc<dyn Fn(&Name, u64)>;

/// Sends encoded data back toward the requester of one incoming interest.
pub trait ReplyChannel {
    fn send(&self, encoded: &[u8]) -> Result<()>;

    /// Encode and send a data packet.
    fn put_data(&self, data: &Data) -> Result<()> {
        self.send(&data.wire_encode())
    }
}

/// A network session.
pub trait Face {
    /// Send an interest. Exactly one of the callbacks fires later.
    /// Returns an id usable with [`Face::remove_pending_interest`].
    fn express_interest(
        &self,
        interest: &Interest,
        on_data: OnData,
        on_timeout: OnTimeout,
        on_nack: OnNack,
    ) -> Result<u64>;

    /// Forget a pending interest; none of its callbacks will fire.
    fn remove_pending_interest(&self, id: u64);

    /// Receive interests under `prefix`.
    fn register_prefix(
        &self,
        prefix: &Name,
        on_interest: OnInterest,
        on_register_failed: OnRegisterFailed,
        on_register_success: Option<OnRegisterSuccess>,
    ) -> Result<u64>;

    /// The face's clock. Freshness and interest expiry are measured on it.
    fn now(&self) -> Instant;
}
