//! # CNL Testkit
//!
//! Testing utilities for CNL.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known encodings and tree orderings, kept in
//!   `vectors/golden.json`
//! - **Generators**: Proptest strategies for names, payloads and segment
//!   delivery orders
//! - **Fixtures**: A producer and a consumer tree joined by an in-memory
//!   network, and a state recorder
//!
//! ## Golden Vectors
//!
//! ```rust
//! use cnl_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors().unwrap() {
//!     println!("{name}: {actual} ({})", if matches { "ok" } else { "MISMATCH" });
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cnl_testkit::generators::{delivery_order, SegmentedParams};
//!
//! proptest! {
//!     #[test]
//!     fn reassembles_in_any_order(params: SegmentedParams, order in delivery_order(8)) {
//!         // publish, then deliver segments in `order`
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use cnl::Object;
//! use cnl_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new("/app").unwrap();
//! fixture.producer.get_child("x").serialize_object(Object::from("hi")).unwrap();
//! let x = fixture.consumer.get_child("x");
//! x.object_needed(false).unwrap();
//! fixture.process();
//! assert!(x.object().is_some());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, StateRecorder, TestFixture};
pub use generators::{delivery_order, payload, SegmentedParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector, VectorInput};
