//! # CNL Face
//!
//! The network session layer underneath the namespace tree.
//!
//! ## Overview
//!
//! A [`Face`] expresses interests and registers prefixes. Results arrive
//! through callbacks on the thread that drives the face. This crate ships
//! one implementation, [`MemoryNetwork`], which connects any number of faces
//! through a deterministic event queue with a virtual clock.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use cnl_core::{Data, Interest, Name};
//! use cnl_face::{Face, MemoryNetwork, NetworkNack, ReplyChannel};
//!
//! let network = MemoryNetwork::new();
//! let producer = network.create_face();
//! let consumer = network.create_face();
//!
//! producer.register_prefix(
//!     &"/app".parse().unwrap(),
//!     Rc::new(|_: &Name, interest: &Interest, reply: Rc<dyn ReplyChannel>, _: u64| {
//!         let _ = reply.put_data(&Data::new(interest.name.clone()).with_content(&b"hi"[..]));
//!     }),
//!     Rc::new(|_: &Name| {}),
//!     None,
//! ).unwrap();
//!
//! consumer.express_interest(
//!     &Interest::new("/app/greeting".parse().unwrap()),
//!     Rc::new(|_: &Interest, data: &Data| println!("got {}", data.name)),
//!     Rc::new(|_: &Interest| println!("timeout")),
//!     Rc::new(|_: &Interest, _: &NetworkNack| println!("nack")),
//! ).unwrap();
//!
//! network.advance(Duration::from_millis(10));
//! ```
//!
//! ## Re-expression
//!
//! [`express_with_backoff`] keeps an interest alive past its own lifetime by
//! re-expressing it with doubling lifetimes until the maximum lifetime runs out.

pub mod error;
pub mod face;
pub mod memory;
pub mod reexpress;

pub use error::{FaceError, Result};
pub use face::{
    Face, NackReason, NetworkNack, OnData, OnInterest, OnNack, OnRegisterFailed,
    OnRegisterSuccess, OnTimeout, ReplyChannel,
};
pub use memory::{MemoryFace, MemoryNetwork};
pub use reexpress::express_with_backoff;
