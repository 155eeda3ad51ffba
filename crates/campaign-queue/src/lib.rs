//! # campaign-queue
//!
//! Delivery of charge events to the downstream billing queue. Two
//! publishers are provided:
//!
//! - **redis**: pushes JSON envelopes onto a Redis list using the
//!   [redis](https://crates.io/crates/redis) crate
//! - **memory**: keeps published events in process, with failure injection
//!   for tests

pub mod memory;
pub mod publisher;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use memory::MemoryPublisher;
pub use publisher::ChargePublisher;
