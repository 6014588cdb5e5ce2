use thiserror::Error;

/// Errors a control stage can report for a single tick.
///
/// None of these are fatal: the caller decides whether to hold the last good
/// output, command a fallback, or abort.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Two consecutive waypoints share a timestamp, so the segment between
    /// them has zero length.
    #[error("degenerate trajectory segment ending at index {index} (t = {time})")]
    DegenerateSegment { index: usize, time: f64 },

    /// `R[2][2]` is too close to zero to divide by (tilt near 90° or inverted).
    #[error("attitude singularity: R33 = {r33}")]
    AttitudeSingularity { r33: f64 },

    /// Thrust used to normalize the acceleration command is at or near zero.
    #[error("invalid thrust divisor: {thrust}")]
    InvalidThrustDivisor { thrust: f64 },

    /// A state, command or feedforward component is NaN or infinite.
    #[error("non-finite input: {what}")]
    NonFiniteInput { what: &'static str },

    /// Waypoint sequences rejected at construction.
    #[error("malformed trajectory: {0}")]
    MalformedTrajectory(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}
