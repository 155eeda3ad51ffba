//! Redis list publisher.

pub mod client;
pub mod publisher;

pub use client::RedisClient;
pub use publisher::RedisPublisher;
