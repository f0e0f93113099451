use super::config::SerialConfig;
use crate::framing::{LineCodec, SerialLine};
use crate::{BridgeError, Result};
use bytes::BytesMut;
use std::io;
use tokio::io::{
    split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf,
};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tokio_util::codec::{Decoder, Encoder};
use tracing::info;

const READ_CHUNK: usize = 1024;

/// An open serial connection
///
/// Generic over the underlying stream so the same transport runs on a real
/// port or on an in-memory pipe.
///
/// ```no_run
/// use serial_http_bridge::serial::{SerialConfig, SerialTransport};
///
/// # fn main() -> serial_http_bridge::Result<()> {
/// let transport = SerialTransport::open(&SerialConfig::default())?;
/// let (writer, reader) = transport.into_split();
/// # Ok(())
/// # }
/// ```
pub struct SerialTransport<S> {
    stream: S,
    config: SerialConfig,
}

impl SerialTransport<SerialStream> {
    /// Opens the configured port as 8N1 without flow control
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let stream = tokio_serial::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|source| BridgeError::Connection {
                port: config.port.clone(),
                source,
            })?;

        info!(port = %config.port, baud_rate = config.baud_rate, "Opened serial port");
        Ok(Self::from_stream(stream, config.clone()))
    }
}

impl<S> SerialTransport<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn from_stream(stream: S, config: SerialConfig) -> Self {
        Self { stream, config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Splits into the write half and the (single) read half
    pub fn into_split(self) -> (SerialWriter<WriteHalf<S>>, SerialReader<ReadHalf<S>>) {
        let (read_half, write_half) = split(self.stream);
        (
            SerialWriter::new(write_half),
            SerialReader::new(read_half, self.config.max_line_length),
        )
    }
}

/// Line-oriented writer
pub struct SerialWriter<W> {
    inner: W,
    codec: LineCodec,
    buf: BytesMut,
}

impl<W> SerialWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            codec: LineCodec::new(),
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Writes `line` followed by `\n` and flushes
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.buf.clear();
        self.codec.encode(line, &mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Line-oriented reader with lossy decoding
pub struct SerialReader<R> {
    inner: R,
    codec: LineCodec,
    buf: BytesMut,
}

impl<R> SerialReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R, max_line_length: usize) -> Self {
        Self {
            inner,
            codec: LineCodec::with_max_length(max_line_length),
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads whatever bytes are available into the internal buffer
    ///
    /// Returns 0 at end of stream. Cancel safe: no bytes are lost if the
    /// future is dropped before completing.
    pub async fn fill(&mut self) -> io::Result<usize> {
        self.buf.reserve(READ_CHUNK);
        self.inner.read_buf(&mut self.buf).await
    }

    /// Pops the next decoded piece already in the buffer
    pub fn buffered_line(&mut self) -> Option<SerialLine> {
        self.codec.decode(&mut self.buf).ok().flatten()
    }

    /// Pops the trailing unterminated fragment, for use at end of stream
    pub fn remainder(&mut self) -> Option<SerialLine> {
        self.codec.decode_eof(&mut self.buf).ok().flatten()
    }

    /// Reads the next full line, joining partial pieces, or `None` once the
    /// stream has ended
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut text = String::new();
        loop {
            if let Some(piece) = self.buffered_line() {
                text.push_str(&piece.text);
                if !piece.partial {
                    return Ok(Some(text));
                }
                continue;
            }
            if self.fill().await? == 0 {
                return Ok(match self.remainder() {
                    Some(rest) => {
                        text.push_str(&rest.text);
                        Some(text)
                    }
                    None if !text.is_empty() => Some(text),
                    None => None,
                });
            }
        }
    }
}
