use crate::http::HttpConfig;
use crate::serial::SerialConfig;
use crate::{BridgeError, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// How long an exchange waits for the device before answering 504
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Complete bridge configuration
///
/// # Examples
///
/// ```
/// use serial_http_bridge::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::default()
///     .with_serial_port("/dev/ttyACM1")
///     .with_http_port(8080)
///     .with_response_timeout(Duration::from_secs(3));
///
/// assert_eq!(config.serial.port, "/dev/ttyACM1");
/// assert_eq!(config.serial.baud_rate, 115_200);
/// assert_eq!(config.http.bind_addr.port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Serial side
    pub serial: SerialConfig,
    /// HTTP side
    pub http: HttpConfig,
    /// Deadline for a single exchange
    pub response_timeout: Duration,
    /// Capacity of the completion channel from the reader to the correlator
    pub completion_capacity: usize,
}

impl BridgeConfig {
    pub fn with_serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial.port = port.into();
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial.baud_rate = baud_rate;
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http.bind_addr.set_port(port);
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.http.bind_addr = bind_addr;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Builds a configuration from positional arguments:
    /// `[SERIAL_PORT] [HTTP_PORT] [BAUD_RATE]`
    ///
    /// ```
    /// use serial_http_bridge::BridgeConfig;
    ///
    /// let args = ["/dev/ttyUSB0", "8000"].map(String::from);
    /// let config = BridgeConfig::from_args(args).unwrap();
    /// assert_eq!(config.serial.port, "/dev/ttyUSB0");
    /// assert_eq!(config.http.bind_addr.port(), 8000);
    /// ```
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = Self::default();

        if let Some(port) = args.next() {
            config = config.with_serial_port(port);
        }
        if let Some(http_port) = args.next() {
            let http_port = http_port
                .parse::<u16>()
                .map_err(|e| BridgeError::Config(format!("invalid HTTP port {http_port:?}: {e}")))?;
            config = config.with_http_port(http_port);
        }
        if let Some(baud_rate) = args.next() {
            let baud_rate = baud_rate
                .parse::<u32>()
                .map_err(|e| BridgeError::Config(format!("invalid baud rate {baud_rate:?}: {e}")))?;
            config = config.with_baud_rate(baud_rate);
        }
        if let Some(extra) = args.next() {
            return Err(BridgeError::Config(format!("unexpected argument {extra:?}")));
        }

        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            http: HttpConfig::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            completion_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.http.bind_addr.port(), 5030);
        assert!(config.http.bind_addr.ip().is_loopback());
        assert_eq!(config.response_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_args_empty_uses_defaults() {
        let config = BridgeConfig::from_args(Vec::new()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.http.bind_addr.port(), 5030);
    }

    #[test]
    fn test_from_args_all_positionals() {
        let config = BridgeConfig::from_args(args(&["COM4", "9000", "57600"])).unwrap();
        assert_eq!(config.serial.port, "COM4");
        assert_eq!(config.http.bind_addr.port(), 9000);
        assert_eq!(config.serial.baud_rate, 57_600);
    }

    #[test]
    fn test_from_args_rejects_bad_numbers() {
        assert!(matches!(
            BridgeConfig::from_args(args(&["/dev/ttyACM0", "http"])),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_args(args(&["/dev/ttyACM0", "5030", "fast"])),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_args(args(&["/dev/ttyACM0", "5030", "9600", "extra"])),
            Err(BridgeError::Config(_))
        ));
    }
}
