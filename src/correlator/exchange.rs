use super::error::ExchangeError;
use crate::framing::ResponsePayload;
use crate::serial::{Completion, LinkControl, SerialWriter};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

/// Identifies one request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything an exchange needs exclusive access to
struct Conversation<W> {
    writer: SerialWriter<W>,
    control: mpsc::UnboundedSender<LinkControl>,
    completions: mpsc::Receiver<Completion>,
    /// A request write was cut off by its deadline and may have left a
    /// partial line on the wire
    write_interrupted: bool,
}

impl<W> Conversation<W>
where
    W: AsyncWrite + Unpin,
{
    /// Forgets anything left over from earlier exchanges and tells the reader
    /// to attribute the next frame to `id`
    fn begin(&mut self, id: ExchangeId) -> Result<(), ExchangeError> {
        while let Ok(stale) = self.completions.try_recv() {
            debug!(stale = %stale.exchange, "Discarding completion of abandoned exchange");
        }
        self.control
            .send(LinkControl::Begin(id))
            .map_err(|_| ExchangeError::Disconnected)
    }

    async fn round_trip(
        &mut self,
        id: ExchangeId,
        request_line: &str,
    ) -> Result<ResponsePayload, ExchangeError> {
        if self.write_interrupted {
            debug!("Terminating request line cut off by an earlier deadline");
            self.writer.write_line("").await.map_err(ExchangeError::Write)?;
            self.write_interrupted = false;
        }

        self.write_interrupted = true;
        let written = self.writer.write_line(request_line).await;
        self.write_interrupted = false;
        written.map_err(ExchangeError::Write)?;

        while let Some(completion) = self.completions.recv().await {
            if completion.exchange == id {
                return Ok(completion.payload);
            }
            debug!(stale = %completion.exchange, "Discarding completion of abandoned exchange");
        }
        Err(ExchangeError::Disconnected)
    }

    fn abandon(&self, id: ExchangeId) {
        // The reader may already be gone; nothing left to abandon then.
        let _ = self.control.send(LinkControl::Abandon(id));
    }
}

/// Serializes requests onto the device
///
/// Holders queue on a FIFO-fair mutex, so concurrent callers are served in
/// arrival order and each waits at most for the exchanges ahead of it, each
/// bounded by its own timeout.
///
/// # Examples
///
/// ```no_run
/// use serial_http_bridge::{BridgeConfig, SerialLink};
/// use serial_http_bridge::serial::SerialTransport;
///
/// # async fn example() -> serial_http_bridge::Result<()> {
/// let config = BridgeConfig::default();
/// let link = SerialLink::attach(SerialTransport::open(&config.serial)?, &config);
///
/// let response = link.correlator().exchange("GET /").await?;
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
pub struct Correlator<W> {
    slot: Mutex<Conversation<W>>,
    next_id: AtomicU64,
    response_timeout: Duration,
}

impl<W> Correlator<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        writer: SerialWriter<W>,
        control: mpsc::UnboundedSender<LinkControl>,
        completions: mpsc::Receiver<Completion>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            slot: Mutex::new(Conversation {
                writer,
                control,
                completions,
                write_interrupted: false,
            }),
            next_id: AtomicU64::new(1),
            response_timeout,
        }
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Sends `request_line` and waits for the device's response frame using
    /// the configured timeout
    pub async fn exchange(&self, request_line: &str) -> Result<ResponsePayload, ExchangeError> {
        self.exchange_with_timeout(request_line, self.response_timeout)
            .await
    }

    /// Sends `request_line` and waits up to `limit` for the response frame
    ///
    /// The deadline covers both the write and the wait. On timeout the request
    /// has still been sent; a frame arriving for it later is dropped. A write
    /// cut off by the deadline is terminated with a bare newline before the
    /// next request goes out.
    pub async fn exchange_with_timeout(
        &self,
        request_line: &str,
        limit: Duration,
    ) -> Result<ResponsePayload, ExchangeError> {
        let mut conversation = self.slot.lock().await;
        let id = ExchangeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let span = tracing::info_span!("exchange", %id);

        async move {
            conversation.begin(id)?;
            debug!(request = request_line, "Sending request to device");

            let started = Instant::now();
            match timeout(limit, conversation.round_trip(id, request_line)).await {
                Ok(Ok(payload)) => {
                    info!(
                        bytes = payload.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Exchange completed"
                    );
                    Ok(payload)
                }
                Ok(Err(e)) => {
                    conversation.abandon(id);
                    warn!(error = %e, "Exchange failed");
                    Err(e)
                }
                Err(_) => {
                    conversation.abandon(id);
                    warn!(timeout_ms = limit.as_millis() as u64, "Device did not respond in time");
                    Err(ExchangeError::Timeout(limit))
                }
            }
        }
        .instrument(span)
        .await
    }
}
