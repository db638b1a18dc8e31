mod error;
mod ground_station;
mod pass_finder;
mod propagation;
mod tle_loader;
mod types;

pub use error::PredictError;
pub use ground_station::GroundStation;
pub use pass_finder::{find_next_pass, find_passes, NEXT_PASS_HORIZON};
pub use tle_loader::TleLoader;
pub use types::{Ephemeris, PassWindow};
#[cfg(test)]
pub use types::Observation;
