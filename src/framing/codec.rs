use bytes::{BufMut, BytesMut};
use std::borrow::Cow;
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// Default upper bound on a single serial line before it is force-split
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// One decoded piece of serial input
///
/// A line longer than the codec's maximum arrives as several pieces; every
/// piece but the last has `partial` set and must be joined to the next one
/// without a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialLine {
    pub text: String,
    pub partial: bool,
}

impl SerialLine {
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: false,
        }
    }

    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: true,
        }
    }
}

/// Newline-delimited codec with permissive UTF-8 decoding
///
/// Decoding strips the terminating `\n` only. A preceding `\r` stays part of
/// the line. Invalid byte sequences are replaced with U+FFFD rather than
/// reported as errors, since a glitchy USB link must never take down the
/// reader. Overlong lines are cut on a UTF-8 character boundary and emitted
/// as partial pieces.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index in the buffer up to which no `\n` has been found
    next_index: usize,
    max_length: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest cut at or below `max` that does not fall inside a UTF-8 sequence
fn split_point(buf: &[u8], max: usize) -> usize {
    (max.saturating_sub(3)..=max)
        .rev()
        .find(|&at| at > 0 && buf[at] & 0xC0 != 0x80)
        .unwrap_or(max)
}

fn decode_lossy(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(line) => line.to_owned(),
        Cow::Owned(line) => {
            debug!(len = bytes.len(), "Replaced invalid UTF-8 in serial line");
            line
        }
    }
}

impl Decoder for LineCodec {
    type Item = SerialLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<SerialLine>, io::Error> {
        let read_to = buf.len().min(self.max_length + 1);
        let newline = buf[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(newline_index + 1);
                Ok(Some(SerialLine::complete(decode_lossy(&line[..newline_index]))))
            }
            None if buf.len() > self.max_length => {
                self.next_index = 0;
                let at = split_point(buf, self.max_length);
                let piece = buf.split_to(at);
                debug!(
                    max = self.max_length,
                    "Serial line exceeded maximum length, emitting partial piece"
                );
                Ok(Some(SerialLine::partial(decode_lossy(&piece))))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<SerialLine>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(SerialLine::complete(decode_lossy(&line))))
    }
}

impl Encoder<&str> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: &str, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
