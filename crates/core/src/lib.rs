//! Pure domain logic for wavebatch: batch record state, identifier-set
//! merging, output accumulation, and the bounded-retry helper.
//!
//! Nothing in this crate talks to the network. The record store and
//! generation-service clients live in their own crates and feed
//! observations into the state transitions defined here.

pub mod batch;
pub mod error;
pub mod idset;
pub mod outputs;
pub mod retry;
