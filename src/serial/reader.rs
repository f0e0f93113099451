use super::config::SerialConfig;
use super::transport::SerialReader;
use crate::correlator::ExchangeId;
use crate::framing::{Collected, FrameState, ResponseCollector, ResponsePayload, SerialLine};
use std::io;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Target under which device debug output is logged
pub const DEVICE_LOG_TARGET: &str = "serial_http_bridge::device";

/// Instructions from the correlator to the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkControl {
    /// An exchange is about to write its request: drop any partial frame and
    /// attribute the next frame to this exchange
    Begin(ExchangeId),
    /// The exchange stopped waiting; its frame, if any, is no longer wanted
    Abandon(ExchangeId),
}

/// A completed frame, tagged with the exchange it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub exchange: ExchangeId,
    pub payload: ResponsePayload,
}

/// The single consumer of serial input
///
/// Feeds every decoded line through a [`ResponseCollector`] and forwards
/// completed frames to the correlator. The collector's buffer is never shared:
/// the only thing that leaves this task is an immutable [`Completion`].
pub struct ReadLoop<R> {
    reader: SerialReader<R>,
    collector: ResponseCollector,
    control: mpsc::UnboundedReceiver<LinkControl>,
    completions: mpsc::Sender<Completion>,
    /// Exchange currently waiting for a frame
    active: Option<ExchangeId>,
    /// Exchange that was active when the frame in progress started
    frame_owner: Option<ExchangeId>,
    read_error_backoff: Duration,
    max_read_errors: u32,
}

impl<R> ReadLoop<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: SerialReader<R>,
        control: mpsc::UnboundedReceiver<LinkControl>,
        completions: mpsc::Sender<Completion>,
        config: &SerialConfig,
    ) -> Self {
        Self {
            reader,
            collector: ResponseCollector::new(),
            control,
            completions,
            active: None,
            frame_owner: None,
            read_error_backoff: config.read_error_backoff,
            max_read_errors: config.max_read_errors.max(1),
        }
    }

    /// Drains the serial channel until it ends, fails for good, or the
    /// correlator goes away
    pub async fn run(mut self) {
        let mut consecutive_errors = 0u32;

        loop {
            tokio::select! {
                // Control first: a Begin must take effect before any byte
                // read after its request was written.
                biased;

                control = self.control.recv() => match control {
                    Some(control) => self.apply(control),
                    None => {
                        debug!("Correlator dropped, stopping serial reader");
                        break;
                    }
                },
                read = self.reader.fill() => match read {
                    Ok(0) => {
                        if let Some(line) = self.reader.remainder() {
                            self.on_line(&line).await;
                        }
                        info!("Serial port closed by device");
                        break;
                    }
                    Ok(_) => {
                        consecutive_errors = 0;
                        if !self.drain_lines().await {
                            break;
                        }
                    }
                    Err(e) if is_transient(&e) => {
                        trace!(error = %e, "Transient serial read error");
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= self.max_read_errors {
                            error!(
                                error = %e,
                                attempts = consecutive_errors,
                                "Serial port unrecoverable, stopping reader"
                            );
                            break;
                        }
                        warn!(
                            error = %e,
                            attempt = consecutive_errors,
                            backoff_ms = self.read_error_backoff.as_millis() as u64,
                            "Serial read error, retrying"
                        );
                        tokio::time::sleep(self.read_error_backoff).await;
                    }
                },
            }
        }

        info!("Serial reader stopped");
    }

    fn apply(&mut self, control: LinkControl) {
        match control {
            LinkControl::Begin(id) => {
                if self.collector.state() == FrameState::Collecting {
                    let discarded = self.collector.reset();
                    debug!(exchange = %id, discarded_lines = discarded, "Cleared stale partial frame");
                } else {
                    self.collector.reset();
                }
                self.active = Some(id);
                self.frame_owner = None;
            }
            LinkControl::Abandon(id) => {
                if self.active == Some(id) {
                    self.active = None;
                }
            }
        }
    }

    /// Returns false once the correlator can no longer receive completions
    async fn drain_lines(&mut self) -> bool {
        while let Some(line) = self.reader.buffered_line() {
            if !self.on_line(&line).await {
                return false;
            }
        }
        true
    }

    async fn on_line(&mut self, line: &SerialLine) -> bool {
        let outcome = self.collector.feed_line(line);
        if let Some(anomaly) = outcome.anomaly() {
            warn!(%anomaly, "Serial framing anomaly");
        }

        match outcome {
            Collected::Debug => {
                info!(target: DEVICE_LOG_TARGET, "{}", line.text.trim_end());
            }
            Collected::Started { qualifier, .. } => {
                if let Some(qualifier) = qualifier {
                    warn!(%qualifier, "Device flagged response frame");
                }
                self.frame_owner = self.active;
                trace!("Response frame started");
            }
            Collected::Body => {}
            Collected::Completed(payload) => {
                let owner = self.frame_owner.take();
                match owner.filter(|id| self.active == Some(*id)) {
                    Some(exchange) => {
                        self.active = None;
                        debug!(%exchange, bytes = payload.len(), "Response frame completed");
                        if self.completions.send(Completion { exchange, payload }).await.is_err() {
                            debug!("Correlator dropped, stopping serial reader");
                            return false;
                        }
                    }
                    None => {
                        warn!(bytes = payload.len(), "Discarding unsolicited response frame");
                    }
                }
            }
            Collected::Anomaly(_) => {}
        }
        true
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
