use super::codec::SerialLine;
use super::scanner::{start_qualifier, FrameScanner, FrameState, LineKind};
use std::fmt;

/// A completed response frame, immutable once finalized
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponsePayload(String);

impl ResponsePayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the device sent a complete HTTP response (status line first)
    pub fn is_http_response(&self) -> bool {
        self.0.starts_with("HTTP/1.1")
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ResponsePayload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl AsRef<str> for ResponsePayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResponsePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Framing irregularities. Logged by the reader, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolAnomaly {
    #[error("end marker received with no frame in progress")]
    EndWithoutStart,
    #[error("start marker received mid-frame, discarded {discarded_lines} buffered line(s)")]
    RestartedFrame { discarded_lines: usize },
}

/// What feeding a line into the collector produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    /// Device output outside of any frame
    Debug,
    /// A frame was opened; `discarded_lines` is set when it replaced a partial frame
    Started {
        qualifier: Option<String>,
        discarded_lines: Option<usize>,
    },
    /// A body line was buffered
    Body,
    /// A frame was closed
    Completed(ResponsePayload),
    /// An end marker arrived while idle
    Anomaly(ProtocolAnomaly),
}

impl Collected {
    /// The framing anomaly carried by this outcome, if any
    pub fn anomaly(&self) -> Option<ProtocolAnomaly> {
        match self {
            Collected::Anomaly(anomaly) => Some(anomaly.clone()),
            Collected::Started {
                discarded_lines: Some(discarded_lines),
                ..
            } => Some(ProtocolAnomaly::RestartedFrame {
                discarded_lines: *discarded_lines,
            }),
            _ => None,
        }
    }
}

/// Accumulates body lines of the frame in progress
///
/// Lines are stored with their `\n` terminator restored and any other
/// line-ending characters left untouched, so a device emitting CRLF produces
/// a byte-faithful HTTP response.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    scanner: FrameScanner,
    buffer: String,
    lines: usize,
    /// Kind of the line whose remaining pieces are still to come
    open_line: Option<LineKind>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameState {
        self.scanner.state()
    }

    /// Number of body lines buffered for the frame in progress
    pub fn buffered_lines(&self) -> usize {
        self.lines
    }

    /// Feeds one complete line through the scanner
    pub fn feed(&mut self, line: &str) -> Collected {
        self.feed_piece(line, false)
    }

    /// Feeds one decoded piece, joining partial pieces into a single line
    ///
    /// Only the first piece of a line is classified; the rest inherit its
    /// kind, so a split body line is buffered without an extra line break.
    pub fn feed_line(&mut self, line: &SerialLine) -> Collected {
        self.feed_piece(&line.text, line.partial)
    }

    fn feed_piece(&mut self, text: &str, partial: bool) -> Collected {
        if let Some(kind) = self.open_line {
            if !partial {
                self.open_line = None;
            }
            return match kind {
                LineKind::BodyLine => self.push_body(text, partial),
                _ => Collected::Debug,
            };
        }

        let previous = self.scanner.state();
        let kind = self.scanner.scan(text);
        if partial {
            self.open_line = Some(kind);
        }

        match kind {
            LineKind::StartMarker => {
                let discarded = self.clear();
                Collected::Started {
                    qualifier: start_qualifier(text).map(str::to_owned),
                    discarded_lines: (previous == FrameState::Collecting).then_some(discarded),
                }
            }
            LineKind::EndMarker if previous == FrameState::Idle => {
                Collected::Anomaly(ProtocolAnomaly::EndWithoutStart)
            }
            LineKind::EndMarker => {
                self.lines = 0;
                Collected::Completed(ResponsePayload(std::mem::take(&mut self.buffer)))
            }
            LineKind::BodyLine => self.push_body(text, partial),
            LineKind::DebugLine => Collected::Debug,
        }
    }

    fn push_body(&mut self, text: &str, partial: bool) -> Collected {
        self.buffer.push_str(text);
        if !partial {
            self.buffer.push('\n');
            self.lines += 1;
        }
        Collected::Body
    }

    /// Drops any partial frame and returns to `Idle`
    ///
    /// Returns the number of buffered lines that were discarded.
    pub fn reset(&mut self) -> usize {
        self.scanner.reset();
        // The rest of a line cut off by the reset is not the start of a new one.
        if self.open_line.is_some() {
            self.open_line = Some(LineKind::DebugLine);
        }
        self.clear()
    }

    fn clear(&mut self) -> usize {
        self.buffer.clear();
        std::mem::take(&mut self.lines)
    }
}
