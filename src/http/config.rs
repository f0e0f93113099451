use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port of the local HTTP listener
pub const DEFAULT_HTTP_PORT: u16 = 5030;

/// Configuration for the HTTP front
///
/// # Examples
///
/// ```rust
/// use serial_http_bridge::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     max_connections: 16,
///     max_request_size: 4096,
///     read_timeout: Duration::from_secs(10),
///     write_timeout: Duration::from_secs(10),
///     server_name: None,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Largest request head accepted, in bytes
    pub max_request_size: usize,
    /// Read timeout for the request head
    pub read_timeout: Duration,
    /// Write timeout for the response
    pub write_timeout: Duration,
    /// Server name to include in synthesized responses (optional)
    pub server_name: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)),
            max_connections: 100,
            max_request_size: 8192,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            server_name: Some(concat!("serial-http-bridge/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}
