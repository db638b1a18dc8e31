use thiserror::Error;

use crate::abort::Aborted;
use crate::device::{ConfigError, DeviceError};
use crate::predict::PredictError;
use crate::settings::SettingsError;
use crate::transponder::TransponderError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("must provide a rotor config, a radio config or both")]
    NoControlSurface,
    #[error("radio '{0}' has no channel that can be tuned")]
    NoUsableChannel(String),
    #[error("no frequencies for the radio; select a transponder with --transponder or pass --downlink/--uplink")]
    NoFrequencies,
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("prediction error: {0}")]
    Predict(#[from] PredictError),
    #[error("transponder error: {0}")]
    Transponder(#[from] TransponderError),
    #[error(transparent)]
    Cancelled(#[from] Aborted),
}
