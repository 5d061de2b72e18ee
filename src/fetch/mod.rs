//! HTTP plumbing for the booking backend.
//!
//! [`HttpClient`] is the transport seam, [`BasicClient`] its `reqwest`
//! implementation. [`ApiRequest`] describes a request independently of any
//! token, and [`AuthenticatedHttpClient`] sends it with the session's
//! credentials.

mod authenticated;
mod basic;
mod client;
mod request;

pub mod auth;

#[cfg(test)]
pub(crate) mod testing;

pub use authenticated::AuthenticatedHttpClient;
pub(crate) use authenticated::{api_error, decode_json, read_body};
pub use basic::BasicClient;
pub use client::HttpClient;
pub use request::ApiRequest;
