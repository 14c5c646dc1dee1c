//! Error types for controllers and reward models.

use thiserror::Error;

/// Failures raised by scaling controllers and their reward models.
///
/// Any of these must prevent the pool resize for the period: the engine
/// never applies an undefined server count.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("reward model failed to fit: {0}")]
    FitFailed(String),
    #[error("reward model has not been fitted yet")]
    NotFitted,
    #[error("reward model produced a non-finite prediction for {candidate} servers")]
    NonFinitePrediction { candidate: u32 },
    #[error("exploration rate {0} is outside [0, 1]")]
    InvalidExplorationRate(f64),
    #[error("candidate server range ({min}, {max}) is empty")]
    EmptyServerRange { min: u32, max: u32 },
}
