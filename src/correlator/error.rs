use http::StatusCode;
use std::io;
use std::time::Duration;

/// Per-request failures. None of them are fatal to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// No end marker within the deadline
    #[error("device did not respond within {0:?}")]
    Timeout(Duration),

    /// The request line could not be written to the serial port
    #[error("failed to write request to serial port: {0}")]
    Write(#[source] io::Error),

    /// The serial reader has stopped
    #[error("serial link is not connected")]
    Disconnected,
}

impl ExchangeError {
    /// HTTP status the bridge answers with for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ExchangeError::Write(_) | ExchangeError::Disconnected => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
