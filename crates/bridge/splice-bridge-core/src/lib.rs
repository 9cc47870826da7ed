//! Bridge between Splice object graphs and a dynamically typed host runtime.
//!
//! The bridge has four parts:
//!
//! - [`convert`]: value marshaling in both directions, including the
//!   recursive container codec and the host-number policy.
//! - [`host`]: an in-process model of the host realm with wrapper identity,
//!   a pin table and scope configuration.
//! - [`keepalive`]: the ownership synchronization between native reference
//!   counts and host collection.
//! - [`sequence`]: host-convention mutable views over owned-element vectors.
//!
//! The [`host`] module is an in-process stand-in for a real host realm, so
//! everything here runs on plain native builds, which is where the semantics
//! are tested. A concrete embedding (such as the wasm surface) applies the
//! same conversion order to its own boundary values and drives [`keepalive`]
//! the same way.

pub mod convert;
pub mod error;
pub mod host;
pub mod keepalive;
pub mod sequence;

pub use convert::{
    bigint_to_value, call_host_function, dictionary_to_host, host_to_dictionary, host_to_sequence,
    host_to_value, number_to_value, sequence_to_host, value_to_host, NumberPolicy,
};
pub use error::BridgeError;
pub use host::{
    HostArray, HostFunction, HostHandle, HostKey, HostObject, HostScope, HostSymbol, HostValue,
    ScopeConfig,
};
pub use keepalive::{bridge_object, install_external_keepalive_monitor, Crossing, ManagingPtr};
pub use sequence::{Projection, SequenceProxy, SequenceProxyIter};
