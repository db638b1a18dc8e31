use chrono::{DateTime, Utc};

use crate::predict::error::PredictError;
use crate::predict::GroundStation;

/// Information about a single satellite from TLE
#[derive(Debug, Clone)]
pub struct SatelliteInfo {
    pub name: String,
    pub norad_id: u32,
    pub international_designator: Option<String>,
    pub tle_source: String,
}

/// Topocentric look angles and range rate at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_km: f64,
    /// Positive while the satellite recedes from the station.
    pub range_rate_km_s: f64,
}

impl Observation {
    /// Whole-degree (azimuth, elevation) used for display and rotor commands.
    pub fn look_angles(&self) -> (i32, i32) {
        (
            self.azimuth_deg.round() as i32,
            self.elevation_deg.round() as i32,
        )
    }
}

/// Anything that can place a satellite relative to a ground station.
pub trait Ephemeris {
    fn name(&self) -> &str;

    fn observe(
        &self,
        station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError>;
}

/// A predicted satellite pass
#[derive(Debug, Clone)]
pub struct Pass {
    pub satellite: String,
    pub aos: DateTime<Utc>,
    pub los: DateTime<Utc>,
    pub tca: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub aos_azimuth_deg: f64,
    pub los_azimuth_deg: f64,
    pub duration_seconds: i64,
}

/// Start of the pass a session waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassWindow {
    pub rise_time: DateTime<Utc>,
    pub initial_azimuth_deg: i32,
}

impl From<&Pass> for PassWindow {
    fn from(pass: &Pass) -> Self {
        Self {
            rise_time: pass.aos,
            initial_azimuth_deg: pass.aos_azimuth_deg.round() as i32,
        }
    }
}
