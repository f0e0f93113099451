use super::config::HttpConfig;
use super::protocol::{
    read_request_head, render_method_not_allowed, render_payload, render_status,
    HttpProtocolError,
};
use crate::common::{BridgeServer, RequestHandler};
use crate::{BridgeError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, sync::broadcast, time::timeout};
use tracing::{debug, error, info, warn, Instrument};

/// HTTP listener that forwards each GET request to a [`RequestHandler`]
///
/// Every connection carries exactly one request and is closed after the
/// response, so a browser's parallel requests show up as parallel
/// connections that queue inside the handler.
///
/// # Examples
///
/// ```no_run
/// use serial_http_bridge::common::BridgeServer;
/// use serial_http_bridge::http::{HttpConfig, HttpFront};
/// use serial_http_bridge::serial::SerialTransport;
/// use serial_http_bridge::{BridgeConfig, SerialLink};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BridgeConfig::default();
///     let link = SerialLink::attach(SerialTransport::open(&config.serial)?, &config);
///
///     let front = HttpFront::new(HttpConfig::default(), link.correlator());
///     let shutdown = front.shutdown_signal();
///     tokio::spawn(async move {
///         tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///         let _ = shutdown.send(());
///     });
///     front.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpFront {
    config: HttpConfig,
    handler: Arc<dyn RequestHandler>,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

impl HttpFront {
    pub fn new(config: HttpConfig, handler: Arc<dyn RequestHandler>) -> Self {
        let (shutdown_signal, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    /// Uses an externally owned shutdown sender instead of a private one
    pub fn with_shutdown_signal(mut self, shutdown_signal: broadcast::Sender<()>) -> Self {
        self.shutdown_signal = Arc::new(shutdown_signal);
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Binds the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(BridgeError::Io)
    }

    /// Accepts connections on `listener` until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "HTTP front listening");
        info!("Open http://{} in a browser", local_addr);

        let connection_count = Arc::new(AtomicUsize::new(0));
        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let current_count = connection_count.load(Ordering::SeqCst);
                            if current_count >= self.config.max_connections {
                                warn!(%addr, current = current_count, limit = self.config.max_connections, "Connection rejected: limit reached");
                                continue;
                            }

                            let new_count = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(%addr, current = new_count, "Accepted connection");

                            let config = self.config.clone();
                            let handler = Arc::clone(&self.handler);
                            let connection_count = connection_count.clone();
                            let span = tracing::info_span!("connection", %addr);

                            tokio::spawn(async move {
                                let result = Self::handle_connection(stream, addr, config, handler).instrument(span).await;
                                if let Err(e) = result {
                                    error!(%addr, error = %e, "Error handling connection");
                                }
                                let final_count = connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                                debug!(%addr, current = final_count, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping HTTP front");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping HTTP front");
                    break;
                }
            }
        }

        info!("HTTP front stopped");
        Ok(())
    }

    /// Handles a single request/response connection
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        config: HttpConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<()> {
        let server_name = config.server_name.as_deref();

        let read_result = timeout(
            config.read_timeout,
            read_request_head(&mut stream, config.max_request_size),
        )
        .await;
        let head = match read_result {
            Ok(Ok(head)) => head,
            Ok(Err(HttpProtocolError::IncompleteRequest)) => {
                debug!(%addr, "Client closed connection before sending a request");
                return Ok(());
            }
            Ok(Err(e)) => {
                if let Some(status) = e.response_status() {
                    let response = render_status(status, &e.to_string(), server_name, &[]);
                    // Best effort: the request is already being rejected.
                    let _ = timeout(config.write_timeout, stream.write_all(&response)).await;
                }
                return Err(e.into());
            }
            Err(_) => {
                warn!(%addr, "Read timeout");
                return Ok(());
            }
        };

        info!(method = %head.method, path = %head.path, "Web request");

        let response = if !head.is_get() {
            render_method_not_allowed(&head.method, server_name)
        } else {
            match handler.exchange(&head.request_line()).await {
                Ok(payload) => render_payload(&payload, server_name),
                Err(e) => render_status(e.status(), &e.to_string(), server_name, &[]),
            }
        };

        match timeout(config.write_timeout, stream.write_all(&response)).await {
            Ok(Ok(())) => {
                stream.flush().await?;
                debug!(size = response.len(), "Response sent");
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(%addr, "Write timeout");
                return Ok(());
            }
        }

        // The peer may already have gone; nothing to report then.
        let _ = stream.shutdown().await;
        Ok(())
    }
}

impl BridgeServer for HttpFront {
    async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
