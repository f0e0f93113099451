//! Configuration, traits and test helpers shared across the bridge

pub mod config;
pub mod test_utils;
pub mod traits;

pub use config::BridgeConfig;
pub use test_utils::DeviceStub;
pub use traits::{BridgeServer, RequestHandler};
