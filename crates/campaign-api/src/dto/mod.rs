//! Request and response bodies of the control API.

pub mod request;
pub mod response;
