//! PostgreSQL repository implementations.

pub mod job;
pub mod retry;
pub mod transaction;

pub use job::JobRepository;
pub use retry::ExpiredRetryRepository;
pub use transaction::TransactionRepository;
