//! In-process publisher.

pub mod publisher;

pub use publisher::MemoryPublisher;
