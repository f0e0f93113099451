//! Serial frame recognition
//!
//! The device interleaves free-form debug output with HTTP responses. A
//! response is delimited by a start marker line and an end marker line; this
//! module turns decoded serial lines into completed response payloads.

pub mod codec;
pub mod collector;
pub mod scanner;


pub use codec::{LineCodec, SerialLine};
pub use collector::{Collected, ProtocolAnomaly, ResponseCollector, ResponsePayload};
pub use scanner::{FrameScanner, FrameState, LineKind, END_MARKER, START_MARKER};
