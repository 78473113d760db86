//! Test fixtures and helpers.
//!
//! A producer and a consumer tree sharing an in-memory network, plus a
//! recorder for the state changes a test wants to assert on.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cnl::core::{Ed25519PublicKey, Ed25519Signer, Ed25519Validator, Keypair, Name};
use cnl::face::MemoryNetwork;
use cnl::{Namespace, NamespaceState, Result};

/// Install a test-writer tracing subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A producer tree that answers interests under `prefix`, a consumer tree
/// for the same prefix, and the network between them.
pub struct TestFixture {
    pub network: Rc<MemoryNetwork>,
    pub keypair: Keypair,
    pub producer: Namespace,
    pub consumer: Namespace,
}

impl TestFixture {
    /// Create a fixture with a fixed signing key.
    pub fn new(prefix: &str) -> Result<Self> {
        Self::with_seed(prefix, [0x42; 32])
    }

    pub fn with_seed(prefix: &str, seed: [u8; 32]) -> Result<Self> {
        let prefix: Name = prefix.parse()?;
        let network = MemoryNetwork::new();
        let keypair = Keypair::from_seed(&seed);

        let producer = Namespace::new(prefix.clone());
        let registered = prefix.clone();
        producer.set_face(
            network.create_face(),
            Some(Rc::new(move |_: &Name| {
                tracing::error!(prefix = %registered, "prefix registration failed");
            })),
        )?;
        producer.set_signer(Rc::new(Ed25519Signer::new(
            keypair.clone(),
            prefix.clone().append("KEY"),
        )));

        let consumer = Namespace::new(prefix);
        consumer.set_face(network.create_face(), None)?;

        Ok(Self {
            network,
            keypair,
            producer,
            consumer,
        })
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Make the consumer check every packet against the producer's key.
    pub fn validate_consumer(&self) {
        self.consumer
            .set_validator(Rc::new(Ed25519Validator::new(self.public_key())));
    }

    /// Another consumer tree for the same prefix on the same network.
    pub fn add_consumer(&self) -> Result<Namespace> {
        let consumer = Namespace::new(self.consumer.name().clone());
        consumer.set_face(self.network.create_face(), None)?;
        Ok(consumer)
    }

    /// Deliver everything queued on the network.
    pub fn process(&self) -> usize {
        self.network.process_events()
    }

    /// Move the virtual clock, firing timeouts on the way.
    pub fn advance(&self, by: Duration) {
        self.network.advance(by);
    }
}

/// Every state change seen under a node, in delivery order.
#[derive(Clone, Default)]
pub struct StateRecorder {
    events: Rc<RefCell<Vec<(Name, NamespaceState)>>>,
}

impl StateRecorder {
    /// Start recording changes under `namespace`.
    pub fn attach(namespace: &Namespace) -> Self {
        let recorder = Self::default();
        let events = Rc::clone(&recorder.events);
        namespace.add_on_state_changed(move |_, changed, state, _| {
            events.borrow_mut().push((changed.name().clone(), state));
        });
        recorder
    }

    pub fn events(&self) -> Vec<(Name, NamespaceState)> {
        self.events.borrow().clone()
    }

    /// States reported for exactly `name`.
    pub fn states_of(&self, name: &Name) -> Vec<NamespaceState> {
        self.events
            .borrow()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn saw(&self, name: &Name, state: NamespaceState) -> bool {
        self.states_of(name).contains(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnl::Object;

    #[test]
    fn test_fixture_round_trip() {
        init_tracing();
        let fixture = TestFixture::new("/app").unwrap();
        fixture.validate_consumer();
        fixture
            .producer
            .get_child("greeting")
            .serialize_object(Object::from("hi"))
            .unwrap();

        let greeting = fixture.consumer.get_child("greeting");
        let recorder = StateRecorder::attach(&fixture.consumer);
        greeting.object_needed(false).unwrap();
        fixture.process();

        assert_eq!(greeting.blob_object().unwrap().as_ref(), b"hi");
        assert!(recorder.saw(greeting.name(), NamespaceState::InterestExpressed));
        assert_eq!(
            recorder.states_of(greeting.name()).last(),
            Some(&NamespaceState::ObjectReady)
        );
    }

    #[test]
    fn test_seeds_give_distinct_keys() {
        let a = TestFixture::with_seed("/a", [1; 32]).unwrap();
        let b = TestFixture::with_seed("/a", [2; 32]).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }
}
