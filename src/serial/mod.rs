//! Serial transport
//!
//! Owns the connection to the device. The transport splits into a writer,
//! used by whichever exchange holds the conversation slot, and a reader that
//! is drained by a single background read loop for the lifetime of the link.

pub mod config;
pub mod reader;
pub mod transport;


pub use config::SerialConfig;
pub use reader::{Completion, LinkControl, ReadLoop, DEVICE_LOG_TARGET};
pub use transport::{SerialReader, SerialTransport, SerialWriter};
