mod config;
mod doppler;
mod radio;

pub use config::{ChannelConfig, RadioConfig, UsbOverrides};
pub use doppler::doppler_corrected;
pub use radio::Radio;
#[cfg(test)]
pub use radio::{Channel, ChannelKind, Link};
