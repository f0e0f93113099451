//! HTTP front
//!
//! Accepts browser connections on a local port, forwards `METHOD PATH` to a
//! [`RequestHandler`](crate::common::RequestHandler) and writes back whatever
//! the device answered, wrapping bare content in a minimal HTTP response.

pub mod config;
pub mod protocol;
pub mod server;


pub use config::HttpConfig;
pub use protocol::{HttpProtocolError, RequestHead};
pub use server::HttpFront;
