/// Token that opens a response frame. Matched as a substring so that
/// qualified forms such as `=== HTTP REQUEST (TIMEOUT) ===` also count.
pub const START_MARKER: &str = "=== HTTP REQUEST";

/// Line that closes a response frame.
pub const END_MARKER: &str = "=== END HTTP RESPONSE ===";

/// Whether the scanner is currently inside a response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Collecting,
}

/// Classification of a single serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Opens (or restarts) a response frame
    StartMarker,
    /// Closes a response frame
    EndMarker,
    /// Part of the response currently being collected
    BodyLine,
    /// Unrelated device output seen outside of a frame
    DebugLine,
}

/// Line classifier driving the `Idle`/`Collecting` state machine
///
/// # Examples
///
/// ```
/// use serial_http_bridge::framing::{FrameScanner, FrameState, LineKind};
///
/// let mut scanner = FrameScanner::new();
/// assert_eq!(scanner.scan("boot ok"), LineKind::DebugLine);
/// assert_eq!(scanner.scan("=== HTTP REQUEST ==="), LineKind::StartMarker);
/// assert_eq!(scanner.state(), FrameState::Collecting);
/// assert_eq!(scanner.scan("HTTP/1.1 200 OK"), LineKind::BodyLine);
/// assert_eq!(scanner.scan("=== END HTTP RESPONSE ==="), LineKind::EndMarker);
/// assert_eq!(scanner.state(), FrameState::Idle);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameScanner {
    state: FrameState,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Classifies `line` against `state` and returns the next state
    ///
    /// A start marker always moves to `Collecting`, even when already
    /// collecting: frames never nest, so a second start means the previous
    /// end marker was lost. An end marker always moves to `Idle`.
    pub fn classify(state: FrameState, line: &str) -> (LineKind, FrameState) {
        if is_start_marker(line) {
            (LineKind::StartMarker, FrameState::Collecting)
        } else if is_end_marker(line) {
            (LineKind::EndMarker, FrameState::Idle)
        } else {
            match state {
                FrameState::Collecting => (LineKind::BodyLine, FrameState::Collecting),
                FrameState::Idle => (LineKind::DebugLine, FrameState::Idle),
            }
        }
    }

    /// Classifies `line` and advances the scanner
    pub fn scan(&mut self, line: &str) -> LineKind {
        let (kind, next) = Self::classify(self.state, line);
        self.state = next;
        kind
    }

    /// Forces the scanner back to `Idle`
    pub fn reset(&mut self) {
        self.state = FrameState::Idle;
    }
}

/// Returns true if `line` carries the start token anywhere
pub fn is_start_marker(line: &str) -> bool {
    line.contains(START_MARKER)
}

/// Returns true if `line` is exactly the end marker, ignoring one trailing `\r`
pub fn is_end_marker(line: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == END_MARKER
}

/// Extracts the parenthesized qualifier of a start marker line
///
/// ```
/// use serial_http_bridge::framing::scanner::start_qualifier;
///
/// assert_eq!(start_qualifier("=== HTTP REQUEST (TIMEOUT) ==="), Some("TIMEOUT"));
/// assert_eq!(start_qualifier("=== HTTP REQUEST ==="), None);
/// ```
pub fn start_qualifier(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(START_MARKER)?;
    let open = rest.find('(')?;
    let close = open + rest[open..].find(')')?;
    let qualifier = rest[open + 1..close].trim();
    (!qualifier.is_empty()).then_some(qualifier)
}
