//! # CNL
//!
//! A namespace-oriented client library for named-data networking: the
//! application works with a tree of names and the objects at them, and the
//! library turns that into interests, data packets and their lifecycles.
//!
//! ## Overview
//!
//! - **Namespace**: a node in the name tree. Holds the data packet and the
//!   decoded object at its name, plus a state that tracks fetching or
//!   producing them. Listeners on a node see changes in its whole subtree.
//! - **Handlers**: pluggable behavior attached to a node. They request
//!   children, decode blobs into richer objects and produce packets.
//! - **Segment streams**: fetch `<name>/seg=N` in order with a bounded
//!   pipeline of interests.
//! - **Segmented objects**: split a large payload into segments and
//!   reassemble it, optionally checked against a digest manifest.
//! - **Generalized objects**: objects with a `_meta` content-meta record,
//!   and streams of them advertised through `_latest`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use cnl::{Namespace, NamespaceState, SegmentedObjectHandler};
//! use cnl::face::MemoryNetwork;
//!
//! fn example() -> cnl::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let video = Namespace::new("/example/video".parse()?);
//!     video.set_face(network.create_face(), None)?;
//!
//!     let handler = SegmentedObjectHandler::new(Default::default())?;
//!     handler.add_on_segmented_object(|_, object, _| {
//!         println!("got {:?}", object);
//!     });
//!     video.set_handler(handler)?;
//!
//!     video.add_on_state_changed(|_, changed, state, _| {
//!         if state == NamespaceState::InterestTimeout {
//!             eprintln!("timed out: {}", changed.name());
//!         }
//!     });
//!     video.object_needed(false)?;
//!     network.process_events();
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `cnl::core` - names, packets, content meta and signing
//! - `cnl::face` - the face abstraction and an in-memory network
//! - `cnl::access` - content-key encryption for published objects

pub mod callback;
pub mod config;
pub mod error;
pub mod fetch;
pub mod generalized;
pub mod handler;
pub mod namespace;
pub mod object;
pub mod pending_table;
pub mod segment_stream;
pub mod segmented_object;
pub mod state;

pub use cnl_access as access;
pub use cnl_core as core;
pub use cnl_face as face;

pub use config::{
    GeneralizedObjectConfig, GeneralizedStreamConfig, NamespaceConfig, SegmentStreamConfig,
    SegmentedObjectConfig,
};
pub use error::{NamespaceError, Result};
pub use fetch::fetch_object;
pub use generalized::{GeneralizedObjectHandler, GeneralizedObjectStreamHandler, LATEST, META};
pub use handler::{Handler, HandlerBinding, OnDeserialized};
pub use namespace::{Namespace, NeedOptions, OnObject, WeakNamespace};
pub use object::Object;
pub use pending_table::PendingIncomingInterestTable;
pub use segment_stream::SegmentStreamHandler;
pub use segmented_object::{SegmentedObjectHandler, MANIFEST};
pub use state::{NamespaceState, ValidateState};

pub use cnl_core::{Component, ContentMetaInfo, Data, Interest, MetaInfo, Name};
