mod config;
mod rotor;

pub use config::RotorConfig;
pub use rotor::Rotor;
