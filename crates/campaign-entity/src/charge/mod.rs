//! Charge request entities handed to the downstream billing queue.

pub mod record;
pub mod retry;

pub use record::{ATTEMPTS_MARKER, ChargeEvent, ChargeRecord, generate_tid};
pub use retry::ExpiredRetry;
