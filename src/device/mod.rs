mod config;
mod daemon;
mod error;
mod port;
mod socket;
#[cfg(test)]
pub mod testing;

pub use config::{list_configs, ConfigDocument, ConfigError, Section};
pub use daemon::{DaemonLauncher, DaemonProcess, DaemonSpec};
pub use error::DeviceError;
pub use port::free_local_port;
pub use socket::ProtocolClient;
