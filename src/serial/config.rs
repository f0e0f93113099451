use crate::framing::codec::DEFAULT_MAX_LINE_LENGTH;
use std::time::Duration;

/// Default device path of a USB-CDC serial port on Linux
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// Default line speed
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Configuration for the serial side of the bridge
///
/// # Examples
///
/// ```
/// use serial_http_bridge::serial::SerialConfig;
/// use std::time::Duration;
///
/// let config = SerialConfig::new("/dev/ttyUSB0")
///     .with_baud_rate(9600)
///     .with_read_error_backoff(Duration::from_millis(250));
///
/// assert_eq!(config.port, "/dev/ttyUSB0");
/// assert_eq!(config.baud_rate, 9600);
/// assert_eq!(config.max_read_errors, 10);
/// ```
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial device path (e.g. `/dev/ttyACM0`, `COM3`)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Longest line accepted before it is force-split
    pub max_line_length: usize,
    /// Pause after a failed read before trying again
    pub read_error_backoff: Duration,
    /// Consecutive read failures after which the link is considered lost
    pub max_read_errors: u32,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            read_error_backoff: Duration::from_secs(1),
            max_read_errors: 10,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn with_read_error_backoff(mut self, backoff: Duration) -> Self {
        self.read_error_backoff = backoff;
        self
    }

    pub fn with_max_read_errors(mut self, max_read_errors: u32) -> Self {
        self.max_read_errors = max_read_errors;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERIAL_PORT)
    }
}
