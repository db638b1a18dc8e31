use strum_macros::Display;

/// Phases of a tracking session, in order. `Aborting` can follow any phase
/// after `Predicting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingState {
    Validating,
    Predicting,
    PrePositioning,
    WaitingForRise,
    Tracking,
    Aborting,
    Completed,
}
