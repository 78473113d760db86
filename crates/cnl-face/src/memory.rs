//! A deterministic in-memory network for tests and local simulations.
//!
//! Faces created from one [`MemoryNetwork`] exchange packets through a single
//! event queue. Nothing happens until the owner calls
//! [`MemoryNetwork::process_events`] or [`MemoryNetwork::advance`], and time
//! only moves when [`MemoryNetwork::advance`] is called, so timeout behaviour
//! is exactly reproducible.
//!
//! Routing: an interest goes to the face whose registered prefix is the
//! longest match, never back to the face that sent it. With no match the
//! sender gets a `NoRoute` nack. Data satisfies every pending interest from
//! other faces that it matches.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use cnl_core::{Data, Interest, Name, DEFAULT_INTEREST_LIFETIME};

use crate::error::{FaceError, Result};
use crate::face::{
    Face, NackReason, NetworkNack, OnData, OnInterest, OnNack, OnRegisterFailed,
    OnRegisterSuccess, OnTimeout, ReplyChannel,
};

struct PendingInterest {
    id: u64,
    face_id: u64,
    interest: Interest,
    expires_at: Duration,
    on_data: OnData,
    on_timeout: OnTimeout,
    on_nack: OnNack,
}

struct Registration {
    id: u64,
    face_id: u64,
    prefix: Name,
    on_interest: OnInterest,
}

enum Event {
    Interest { pending_id: u64 },
    Data { from_face: u64, data: Data },
}

#[derive(Default)]
struct NetworkState {
    elapsed: Duration,
    next_id: u64,
    pending: Vec<PendingInterest>,
    registrations: Vec<Registration>,
    events: VecDeque<Event>,
    interests_sent: usize,
    data_sent: usize,
}

impl NetworkState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared state for a set of in-memory faces.
pub struct MemoryNetwork {
    epoch: Instant,
    self_ref: Weak<MemoryNetwork>,
    state: RefCell<NetworkState>,
}

impl MemoryNetwork {
    /// Create a new network with its virtual clock at zero.
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            epoch: Instant::now(),
            self_ref: self_ref.clone(),
            state: RefCell::new(NetworkState::default()),
        })
    }

    /// Create a face attached to this network.
    pub fn create_face(self: &Rc<Self>) -> Rc<MemoryFace> {
        let id = self.state.borrow_mut().allocate_id();
        Rc::new(MemoryFace {
            id,
            network: Rc::clone(self),
        })
    }

    /// Current virtual time.
    pub fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }

    /// Virtual time since the network was created.
    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }

    /// Number of interests still waiting for data, a nack or a timeout.
    pub fn pending_interest_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Total interests expressed on all faces.
    pub fn interests_sent(&self) -> usize {
        self.state.borrow().interests_sent
    }

    /// Total data packets sent through reply channels.
    pub fn data_sent(&self) -> usize {
        self.state.borrow().data_sent
    }

    /// Deliver queued packets until the queue is empty, including packets
    /// queued by the callbacks themselves. Returns the number handled.
    pub fn process_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let event = self.state.borrow_mut().events.pop_front();
            let Some(event) = event else { break };
            handled += 1;
            match event {
                Event::Interest { pending_id } => self.route_interest(pending_id),
                Event::Data { from_face, data } => self.deliver_data(from_face, data),
            }
        }
        handled
    }

    /// Move the clock forward by `by`, firing timeouts in expiry order and
    /// processing the packets they cause along the way.
    pub fn advance(&self, by: Duration) {
        let target = self.elapsed() + by;
        loop {
            self.process_events();
            let expired = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .pending
                    .iter()
                    .map(|p| p.expires_at)
                    .filter(|t| *t <= target)
                    .min();
                let Some(next) = next else { break };
                state.elapsed = state.elapsed.max(next);
                let (expired, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                    .into_iter()
                    .partition(|p| p.expires_at <= next);
                state.pending = rest;
                expired
            };
            for pending in expired {
                tracing::trace!(name = %pending.interest.name, "interest timed out");
                (pending.on_timeout)(&pending.interest);
            }
        }
        self.state.borrow_mut().elapsed = target;
        self.process_events();
    }

    fn route_interest(&self, pending_id: u64) {
        let routed = {
            let state = self.state.borrow();
            let Some(pending) = state.pending.iter().find(|p| p.id == pending_id) else {
                // Removed or already answered.
                return;
            };
            state
                .registrations
                .iter()
                .filter(|r| {
                    r.face_id != pending.face_id && r.prefix.is_prefix_of(&pending.interest.name)
                })
                .max_by_key(|r| r.prefix.len())
                .map(|r| {
                    (
                        r.prefix.clone(),
                        r.id,
                        r.face_id,
                        Rc::clone(&r.on_interest),
                        pending.interest.clone(),
                    )
                })
        };

        match routed {
            Some((prefix, registration_id, face_id, on_interest, interest)) => {
                let reply: Rc<dyn ReplyChannel> = Rc::new(MemoryReplyChannel {
                    network: self.self_ref.clone(),
                    face_id,
                });
                on_interest(&prefix, &interest, reply, registration_id);
            }
            None => {
                let removed = {
                    let mut state = self.state.borrow_mut();
                    state
                        .pending
                        .iter()
                        .position(|p| p.id == pending_id)
                        .map(|i| state.pending.remove(i))
                };
                if let Some(pending) = removed {
                    tracing::debug!(name = %pending.interest.name, "no route for interest");
                    (pending.on_nack)(&pending.interest, &NetworkNack::new(NackReason::NoRoute));
                }
            }
        }
    }

    fn deliver_data(&self, from_face: u64, data: Data) {
        let satisfied: Vec<PendingInterest> = {
            let mut state = self.state.borrow_mut();
            let (matched, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|p| p.face_id != from_face && p.interest.matches_data(&data));
            state.pending = rest;
            matched
        };
        if satisfied.is_empty() {
            tracing::trace!(name = %data.name, "dropping unsolicited data");
        }
        for pending in satisfied {
            (pending.on_data)(&pending.interest, &data);
        }
    }
}

/// One endpoint on a [`MemoryNetwork`].
pub struct MemoryFace {
    id: u64,
    network: Rc<MemoryNetwork>,
}

impl MemoryFace {
    pub fn network(&self) -> &Rc<MemoryNetwork> {
        &self.network
    }
}

impl Face for MemoryFace {
    fn express_interest(
        &self,
        interest: &Interest,
        on_data: OnData,
        on_timeout: OnTimeout,
        on_nack: OnNack,
    ) -> Result<u64> {
        let mut state = self.network.state.borrow_mut();
        let id = state.allocate_id();
        let lifetime = interest.lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME);
        let expires_at = state.elapsed + lifetime;
        state.pending.push(PendingInterest {
            id,
            face_id: self.id,
            interest: interest.clone(),
            expires_at,
            on_data,
            on_timeout,
            on_nack,
        });
        state.events.push_back(Event::Interest { pending_id: id });
        state.interests_sent += 1;
        Ok(id)
    }

    fn remove_pending_interest(&self, id: u64) {
        self.network
            .state
            .borrow_mut()
            .pending
            .retain(|p| p.id != id);
    }

    fn register_prefix(
        &self,
        prefix: &Name,
        on_interest: OnInterest,
        _on_register_failed: OnRegisterFailed,
        on_register_success: Option<OnRegisterSuccess>,
    ) -> Result<u64> {
        let id = {
            let mut state = self.network.state.borrow_mut();
            let id = state.allocate_id();
            state.registrations.push(Registration {
                id,
                face_id: self.id,
                prefix: prefix.clone(),
                on_interest,
            });
            id
        };
        if let Some(on_success) = on_register_success {
            on_success(prefix, id);
        }
        Ok(id)
    }

    fn now(&self) -> Instant {
        self.network.now()
    }
}

/// Queues a reply on the network as if it came from `face_id`.
struct MemoryReplyChannel {
    network: Weak<MemoryNetwork>,
    face_id: u64,
}

impl ReplyChannel for MemoryReplyChannel {
    fn send(&self, encoded: &[u8]) -> Result<()> {
        let network = self.network.upgrade().ok_or(FaceError::Closed)?;
        let data = Data::wire_decode(encoded)?;
        let mut state = network.state.borrow_mut();
        state.events.push_back(Event::Data {
            from_face: self.face_id,
            data,
        });
        state.data_sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    /// A producer that answers every interest with fixed content.
    fn serve(face: &MemoryFace, prefix: &str, content: &'static [u8]) {
        face.register_prefix(
            &name(prefix),
            Rc::new(move |_prefix: &Name, interest: &Interest, reply: Rc<dyn ReplyChannel>, _id: u64| {
                let data = Data::new(interest.name.clone()).with_content(content);
                reply.put_data(&data).unwrap();
            }),
            Rc::new(|_: &Name| {}),
            None,
        )
        .unwrap();
    }

    fn recording_callbacks() -> (Rc<RefCell<Vec<String>>>, OnData, OnTimeout, OnNack) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        (
            log,
            Rc::new(move |_: &Interest, d: &Data| l1.borrow_mut().push(format!("data {}", d.name))),
            Rc::new(move |i: &Interest| l2.borrow_mut().push(format!("timeout {}", i.name))),
            Rc::new(move |i: &Interest, n: &NetworkNack| {
                l3.borrow_mut().push(format!("nack {} {:?}", i.name, n.reason))
            }),
        )
    }

    #[test]
    fn test_interest_data_exchange() {
        let network = MemoryNetwork::new();
        let producer = network.create_face();
        let consumer = network.create_face();
        serve(&producer, "/app", b"hello");

        let (log, on_data, on_timeout, on_nack) = recording_callbacks();
        consumer
            .express_interest(&Interest::new(name("/app/x")), on_data, on_timeout, on_nack)
            .unwrap();
        assert!(log.borrow().is_empty());

        network.process_events();
        assert_eq!(*log.borrow(), vec!["data /app/x".to_string()]);
        assert_eq!(network.pending_interest_count(), 0);
        assert_eq!(network.data_sent(), 1);
    }

    #[test]
    fn test_no_route_nack() {
        let network = MemoryNetwork::new();
        let consumer = network.create_face();
        let (log, on_data, on_timeout, on_nack) = recording_callbacks();
        consumer
            .express_interest(&Interest::new(name("/nowhere")), on_data, on_timeout, on_nack)
            .unwrap();
        network.process_events();
        assert_eq!(*log.borrow(), vec!["nack /nowhere NoRoute".to_string()]);
    }

    #[test]
    fn test_interest_not_routed_to_sender() {
        let network = MemoryNetwork::new();
        let face = network.create_face();
        serve(&face, "/app", b"self");
        let (log, on_data, on_timeout, on_nack) = recording_callbacks();
        face.express_interest(&Interest::new(name("/app/x")), on_data, on_timeout, on_nack)
            .unwrap();
        network.process_events();
        assert_eq!(*log.borrow(), vec!["nack /app/x NoRoute".to_string()]);
    }

    #[test]
    fn test_timeout_fires_at_lifetime() {
        let network = MemoryNetwork::new();
        let producer = network.create_face();
        let consumer = network.create_face();
        // Registered but silent.
        producer
            .register_prefix(
                &name("/silent"),
                Rc::new(|_: &Name, _: &Interest, _: Rc<dyn ReplyChannel>, _: u64| {}),
                Rc::new(|_: &Name| {}),
                None,
            )
            .unwrap();

        let (log, on_data, on_timeout, on_nack) = recording_callbacks();
        let interest = Interest::new(name("/silent/x")).with_lifetime(Duration::from_millis(100));
        consumer.express_interest(&interest, on_data, on_timeout, on_nack).unwrap();

        network.advance(Duration::from_millis(99));
        assert!(log.borrow().is_empty());
        network.advance(Duration::from_millis(1));
        assert_eq!(*log.borrow(), vec!["timeout /silent/x".to_string()]);
        assert_eq!(network.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let network = MemoryNetwork::new();
        let short = network.create_face();
        let long = network.create_face();
        let consumer = network.create_face();
        serve(&short, "/app", b"short");
        serve(&long, "/app/video", b"long");

        let content = Rc::new(RefCell::new(Vec::new()));
        let sink = content.clone();
        consumer
            .express_interest(
                &Interest::new(name("/app/video/1")),
                Rc::new(move |_: &Interest, d: &Data| sink.borrow_mut().push(d.content.clone())),
                Rc::new(|_: &Interest| {}),
                Rc::new(|_: &Interest, _: &NetworkNack| {}),
            )
            .unwrap();
        network.process_events();
        assert_eq!(content.borrow()[0].as_ref(), b"long");
    }

    #[test]
    fn test_removed_interest_is_silent() {
        let network = MemoryNetwork::new();
        let producer = network.create_face();
        let consumer = network.create_face();
        serve(&producer, "/app", b"hello");

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let id = consumer
            .express_interest(
                &Interest::new(name("/app/x")),
                Rc::new(move |_: &Interest, _: &Data| flag.set(true)),
                Rc::new(|_: &Interest| {}),
                Rc::new(|_: &Interest, _: &NetworkNack| {}),
            )
            .unwrap();
        consumer.remove_pending_interest(id);
        network.advance(Duration::from_secs(10));
        assert!(!fired.get());
    }
}
