//! Request/response correlation
//!
//! The device holds one conversation at a time. The correlator serializes
//! concurrent callers into single-flight exchanges: write one request line,
//! wait for the matching frame or a deadline, then let the next caller in.

pub mod error;
pub mod exchange;


pub use error::ExchangeError;
pub use exchange::{Correlator, ExchangeId};
