mod error;
mod session;
mod state;
mod tracker;

pub use error::TrackerError;
pub use session::{Devices, Session};
pub use state::TrackingState;
pub use tracker::{track, TrackRequest};
