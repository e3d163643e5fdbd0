//! Client side of the precis HTTP API.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ClientError, SummaryClient};
