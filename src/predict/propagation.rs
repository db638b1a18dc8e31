use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use crate::predict::error::PredictError;
use crate::predict::types::{Ephemeris, Observation, SatelliteInfo};
use crate::predict::GroundStation;

/// SGP4 element set for one satellite, ready to propagate.
pub struct SatelliteEphemeris {
    pub info: SatelliteInfo,
    pub elements: Elements,
    pub constants: Constants,
}

impl SatelliteEphemeris {
    pub fn from_tle(
        name: Option<String>,
        line1: &str,
        line2: &str,
        source: &str,
    ) -> Result<Self, PredictError> {
        let invalid = |message: String| PredictError::InvalidTle {
            file: source.to_string(),
            message,
        };

        let elements = Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

        let norad_id = elements.norad_id as u32;
        let sat_name = name
            .or_else(|| elements.object_name.clone())
            .unwrap_or_else(|| format!("NORAD {}", norad_id));

        Ok(Self {
            info: SatelliteInfo {
                name: sat_name,
                norad_id,
                international_designator: elements.international_designator.clone(),
                tle_source: source.to_string(),
            },
            elements,
            constants,
        })
    }
}

impl Ephemeris for SatelliteEphemeris {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn observe(
        &self,
        station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let sidereal =
            sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()));

        Ok(look_from(
            station,
            at,
            teme_to_ecef(prediction.position, sidereal),
            teme_to_ecef(prediction.velocity, sidereal),
        ))
    }
}

/// Topocentric observation of a satellite given its rotated TEME state.
/// `sat_vel` is the inertial velocity expressed in ECEF axes.
pub fn look_from(
    station: &GroundStation,
    timestamp: DateTime<Utc>,
    sat_pos: [f64; 3],
    sat_vel: [f64; 3],
) -> Observation {
    let sta_pos = station.position_ecef_km();
    let sta_vel = station.velocity_ecef_km_s();

    let dr = [
        sat_pos[0] - sta_pos[0],
        sat_pos[1] - sta_pos[1],
        sat_pos[2] - sta_pos[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, station.lat_rad(), station.lon_rad());
    let azimuth_deg = east.atan2(north).to_degrees().rem_euclid(360.0);
    let elevation_deg = if range_km > 0.0 {
        (up / range_km).asin().to_degrees()
    } else {
        0.0
    };

    let range_rate_km_s = if range_km > 0.0 {
        let rel_vel = [
            sat_vel[0] - sta_vel[0],
            sat_vel[1] - sta_vel[1],
            sat_vel[2] - sta_vel[2],
        ];
        (rel_vel[0] * dr[0] + rel_vel[1] * dr[1] + rel_vel[2] * dr[2]) / range_km
    } else {
        0.0
    };

    Observation {
        timestamp,
        azimuth_deg,
        elevation_deg,
        range_km,
        range_rate_km_s,
    }
}

pub fn teme_to_ecef(v: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        v[0] * cos_gmst + v[1] * sin_gmst,
        -v[0] * sin_gmst + v[1] * cos_gmst,
        v[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}
