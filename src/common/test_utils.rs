use crate::bridge::SerialLink;
use crate::common::BridgeConfig;
use crate::framing::{END_MARKER, START_MARKER};
use crate::serial::{SerialConfig, SerialTransport};
use std::io;
use tokio::io::{
    split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};

const PIPE_CAPACITY: usize = 64 * 1024;

/// In-memory stand-in for the serial device
///
/// Reads the request lines the bridge writes and writes back whatever lines a
/// test scripts, including debug chatter and framing markers.
pub struct DeviceStub {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl DeviceStub {
    /// Waits for the next request line, or `None` once the bridge hung up
    pub async fn next_request(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Writes raw bytes exactly as given
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    /// Writes one line followed by `\n`
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    pub async fn send_lines(&mut self, lines: &[&str]) -> io::Result<()> {
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(())
    }

    /// Writes a complete response frame around `body`
    pub async fn respond(&mut self, body: &[&str]) -> io::Result<()> {
        self.send_line(&format!("{START_MARKER} ===")).await?;
        self.send_lines(body).await?;
        self.send_line(END_MARKER).await
    }
}

/// The host end of an in-memory pipe, plus a [`DeviceStub`] on the other end
pub fn stub_pipe() -> (DuplexStream, DeviceStub) {
    let (host, device) = tokio::io::duplex(PIPE_CAPACITY);
    let (read_half, write_half) = split(device);
    let stub = DeviceStub {
        reader: BufReader::new(read_half),
        writer: write_half,
    };
    (host, stub)
}

/// A transport over an in-memory pipe, plus the device end of the pipe
pub fn stub_transport(config: &SerialConfig) -> (SerialTransport<DuplexStream>, DeviceStub) {
    let (host, stub) = stub_pipe();
    (SerialTransport::from_stream(host, config.clone()), stub)
}

/// A running serial link attached to a [`DeviceStub`]
///
/// Must be called from within a tokio runtime.
pub fn stub_link(config: &BridgeConfig) -> (SerialLink<WriteHalf<DuplexStream>>, DeviceStub) {
    let (transport, stub) = stub_transport(&config.serial);
    (SerialLink::attach(transport, config), stub)
}
