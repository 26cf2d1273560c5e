// domestia-api: Async Rust client for the Domestia lighting controller

pub mod client;
pub mod error;
pub mod frame;

pub use client::{CONTROLLER_PORT, Connector, ControllerClient, DEFAULT_TIMEOUT, TcpConnector};
pub use error::Error;
pub use frame::{Command, MAX_LEVEL, RelayState};
