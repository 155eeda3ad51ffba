//! Campaign job domain entities.

pub mod model;
pub mod params;
pub mod status;

pub use model::{Job, NewJob};
pub use params::{ExpiredParams, InjectionParams, JobParams, SortOrder, parse_timestamp};
pub use status::{JobKind, JobStatus, ParseEnumError};
