use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::types::{Ephemeris, Pass, PassWindow};
use crate::predict::GroundStation;

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement
const HORIZON_ELEVATION: f64 = 0.0;

/// Default forward search for the next rise.
pub const NEXT_PASS_HORIZON: Duration = Duration::hours(12);

/// Find all passes for a satellite within a time range.
///
/// Only passes whose rise falls inside the window are reported; a pass that is
/// already in progress at `start` is skipped. A pass still up at `end` is
/// closed at `end`.
pub fn find_passes<E: Ephemeris + ?Sized>(
    ephemeris: &E,
    station: &GroundStation,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Pass>, PredictError> {
    let mut passes = Vec::new();
    let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);

    let mut cursor = start;
    let mut prev_visible = ephemeris.observe(station, start)?.elevation_deg >= HORIZON_ELEVATION;
    let mut open: Option<(DateTime<Utc>, f64)> = None;
    let mut max_el = 0.0;
    let mut max_el_time = cursor;

    while cursor < end {
        cursor = (cursor + coarse_step).min(end);
        let sample = ephemeris.observe(station, cursor)?;
        let visible = sample.elevation_deg >= HORIZON_ELEVATION;

        if visible && !prev_visible {
            // AOS detected - refine to find exact crossing
            let aos = refine_crossing(ephemeris, station, cursor - coarse_step, cursor, true)?;
            open = Some(aos);
            max_el = sample.elevation_deg;
            max_el_time = cursor;
        } else if visible && open.is_some() {
            if sample.elevation_deg > max_el {
                max_el = sample.elevation_deg;
                max_el_time = cursor;
            }
        } else if !visible && prev_visible {
            if let Some((aos, aos_az)) = open.take() {
                let (los, los_az) =
                    refine_crossing(ephemeris, station, cursor - coarse_step, cursor, false)?;
                passes.push(Pass {
                    satellite: ephemeris.name().to_string(),
                    aos,
                    los,
                    tca: max_el_time,
                    max_elevation_deg: round2(max_el),
                    aos_azimuth_deg: aos_az,
                    los_azimuth_deg: los_az,
                    duration_seconds: (los - aos).num_seconds(),
                });
            }
            max_el = 0.0;
        }

        prev_visible = visible;
    }

    // Handle pass in progress at end of window
    if let Some((aos, aos_az)) = open {
        let sample = ephemeris.observe(station, end)?;
        passes.push(Pass {
            satellite: ephemeris.name().to_string(),
            aos,
            los: end,
            tca: max_el_time,
            max_elevation_deg: round2(max_el),
            aos_azimuth_deg: aos_az,
            los_azimuth_deg: sample.azimuth_deg,
            duration_seconds: (end - aos).num_seconds(),
        });
    }

    Ok(passes)
}

/// First rise in `[now, now + horizon]` and the azimuth at that instant.
pub fn find_next_pass<E: Ephemeris + ?Sized>(
    ephemeris: &E,
    station: &GroundStation,
    now: DateTime<Utc>,
    horizon: Duration,
) -> Result<PassWindow, PredictError> {
    find_passes(ephemeris, station, now, now + horizon)?
        .first()
        .map(PassWindow::from)
        .ok_or_else(|| PredictError::NoPass {
            satellite: ephemeris.name().to_string(),
            hours: horizon.num_hours(),
        })
}

/// Binary search to find exact horizon crossing time
fn refine_crossing<E: Ephemeris + ?Sized>(
    ephemeris: &E,
    station: &GroundStation,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    is_aos: bool, // true = rising, false = setting
) -> Result<(DateTime<Utc>, f64), PredictError> {
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = ephemeris.observe(station, mid)?.elevation_deg >= HORIZON_ELEVATION;
        if above == is_aos {
            high = mid;
        } else {
            low = mid;
        }
    }

    let final_sample = ephemeris.observe(station, high)?;
    Ok((high, final_sample.azimuth_deg))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
