pub mod config;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod navigation;
pub mod services;
pub mod session;

pub use error::ClientError;
pub use fetch::{ApiRequest, AuthenticatedHttpClient};
pub use session::Session;
