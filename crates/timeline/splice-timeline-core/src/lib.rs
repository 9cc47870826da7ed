//! Core object model for Splice timelines.
//!
//! This crate defines the intrusively reference-counted object graph
//! ([`object`], [`items`]), the type-erased value model exchanged with host
//! runtimes ([`value`]), the time algebra types ([`time`]) and the outcome
//! codes fallible operations report ([`status`]).
//!
//! It is host-agnostic: nothing here knows about any particular embedding.
//! The keepalive monitor hook on [`object::ObjectBase`] is the only seam a
//! bridge needs to observe ownership from the outside.

pub mod items;
pub mod object;
pub mod status;
pub mod time;
pub mod value;

pub use items::{Composition, Effect, Item, Marker};
pub use object::{ObjectBase, Retainer, SerializableObject};
pub use status::Status;
pub use time::{RationalTime, TimeRange, TimeTransform};
pub use value::{Dictionary, ObjectRef, Sequence, Value, ValueKind};
