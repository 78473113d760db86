//! Self-describing objects and streams of them.
//!
//! A generalized object carries a `_meta` child with its content type and
//! timestamp. Small payloads ride inline in `_meta`; larger ones are
//! segmented under the object's node. A generalized stream numbers such
//! objects by sequence number and advertises the newest through `_latest`.

pub mod object_handler;
pub mod stream_handler;

pub use object_handler::{GeneralizedObjectFn, GeneralizedObjectHandler, META};
pub use stream_handler::{GeneralizedObjectStreamHandler, SequencedObjectFn, LATEST};
