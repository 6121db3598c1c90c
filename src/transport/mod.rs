//! Transport layer: the HTTP server and the terminal client that talks to it

pub mod client;
pub mod error;
pub mod http;

pub use error::ApiError;
pub use http::{router, run_http_server, AppState};
