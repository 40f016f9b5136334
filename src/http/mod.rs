//! HTTP surface for rate limit decisions.

mod identity;
mod server;
mod service;

pub use identity::{extract_identifier, UNKNOWN_IDENTIFIER};
pub use server::HttpServer;
pub use service::{decision_response, handle_request, RespBody, DECISION_PREFIX};
