use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::predict::GroundStation;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid station coordinates '{0}', expected \"lat, lon\"")]
    Coordinates(String),
    #[error("tracking update interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub station: StationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub daemons: DaemonConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(default)]
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_update_interval", deserialize_with = "duration")]
    pub update_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
        }
    }
}

fn default_update_interval() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub tle_dir: PathBuf,
    pub transponder_dir: PathBuf,
    pub rotor_config_dir: PathBuf,
    pub radio_config_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tle_dir: PathBuf::from("tle"),
            transponder_dir: PathBuf::from("transponders"),
            rotor_config_dir: PathBuf::from("rotors"),
            radio_config_dir: PathBuf::from("radios"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub host: String,
    pub rotctld: String,
    pub rigctld: String,
    #[serde(deserialize_with = "duration")]
    pub startup_grace: Duration,
    #[serde(deserialize_with = "duration")]
    pub connect_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            rotctld: "rotctld".to_string(),
            rigctld: "rigctld".to_string(),
            startup_grace: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        if settings.tracking.update_interval.is_zero() {
            return Err(SettingsError::ZeroInterval);
        }
        Ok(settings)
    }

    pub fn ground_station(&self) -> Result<GroundStation, SettingsError> {
        GroundStation::from_coordinates(&self.station.coordinates, Some(self.station.altitude_m))
            .ok_or_else(|| SettingsError::Coordinates(self.station.coordinates.clone()))
    }
}
