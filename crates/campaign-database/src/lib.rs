//! # campaign-database
//!
//! PostgreSQL connection management, the persistence traits the scheduler
//! runs against, their PostgreSQL repositories and in-memory
//! implementations.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::{InMemoryJobStore, MemoryLedger, MemoryRetrySource};
pub use store::{ChargeLedger, ExpiredRetrySource, JobStore};
