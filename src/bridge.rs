use crate::Result;
use crate::common::{BridgeConfig, BridgeServer};
use crate::correlator::Correlator;
use crate::http::HttpFront;
use crate::serial::{ReadLoop, SerialTransport};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, Instrument};

/// A serial transport with its background reader running
///
/// The read loop is spawned on attach and stops on [`SerialLink::close`];
/// the port itself closes once the last handle to the correlator is dropped.
pub struct SerialLink<W> {
    correlator: Arc<Correlator<W>>,
    reader: JoinHandle<()>,
}

impl<S> SerialLink<WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Splits `transport`, spawns its read loop and wires it to a correlator
    pub fn attach(transport: SerialTransport<S>, config: &BridgeConfig) -> Self {
        let serial_config = transport.config().clone();
        let (writer, reader) = transport.into_split();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::channel(config.completion_capacity.max(1));

        let read_loop = ReadLoop::new(reader, control_rx, completion_tx, &serial_config);
        let span = tracing::info_span!("serial_reader", port = %serial_config.port);
        let reader = tokio::spawn(read_loop.run().instrument(span));

        let correlator = Arc::new(Correlator::new(
            writer,
            control_tx,
            completion_rx,
            config.response_timeout,
        ));

        Self { correlator, reader }
    }
}

impl<W> SerialLink<W> {
    pub fn correlator(&self) -> Arc<Correlator<W>> {
        Arc::clone(&self.correlator)
    }

    /// Whether the background reader is still draining the port
    pub fn is_reading(&self) -> bool {
        !self.reader.is_finished()
    }

    /// Stops the read loop and waits for it to exit
    pub async fn close(self) {
        self.reader.abort();
        let _ = self.reader.await;
        info!("Serial link closed");
    }
}

/// The full bridge: serial link plus HTTP front
///
/// ```no_run
/// use serial_http_bridge::{Bridge, BridgeConfig, BridgeServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let bridge = Bridge::new(BridgeConfig::default().with_serial_port("/dev/ttyACM0"));
///     bridge.run().await?;
///     Ok(())
/// }
/// ```
pub struct Bridge {
    config: BridgeConfig,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let (shutdown_signal, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl BridgeServer for Bridge {
    /// Opens the serial port, then serves HTTP until shutdown
    ///
    /// Failing to open the port is returned immediately as
    /// [`BridgeError::Connection`](crate::BridgeError::Connection).
    async fn run(&self) -> Result<()> {
        let transport = SerialTransport::open(&self.config.serial)?;
        let link = SerialLink::attach(transport, &self.config);

        let front = HttpFront::new(self.config.http.clone(), link.correlator())
            .with_shutdown_signal(self.shutdown_signal.as_ref().clone());
        let result = front.run().await;

        drop(front);
        link.close().await;
        result
    }

    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
