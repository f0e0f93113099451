use crate::http::protocol::HttpProtocolError;
use thiserror::Error;

/// Error types for the serial-http-bridge library
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The serial device could not be opened
    #[error("Failed to open serial port {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Socket errors (bind, accept, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request/response exchange with the device failed
    #[error("Exchange error: {0}")]
    Exchange(#[from] correlator::ExchangeError),

    /// Malformed or unacceptable HTTP request
    #[error("HTTP error: {0}")]
    Http(HttpProtocolError),
}

impl From<HttpProtocolError> for BridgeError {
    fn from(err: HttpProtocolError) -> Self {
        match err {
            HttpProtocolError::Io(e) => BridgeError::Io(e),
            other => BridgeError::Http(other),
        }
    }
}

/// Result type for the serial-http-bridge library
pub type Result<T> = std::result::Result<T, BridgeError>;

pub mod bridge;
pub mod common;
pub mod correlator;
pub mod framing;
pub mod http;
pub mod serial;

// Re-export main types for convenience
pub use bridge::{Bridge, SerialLink};
pub use common::{BridgeConfig, BridgeServer, RequestHandler};
pub use correlator::{Correlator, ExchangeError, ExchangeId};
pub use framing::{FrameScanner, FrameState, LineKind, ResponseCollector, ResponsePayload};
pub use http::{HttpConfig, HttpFront};
pub use serial::{SerialConfig, SerialTransport};
