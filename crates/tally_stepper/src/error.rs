//! Error types for tally_stepper

use thiserror::Error;

/// Errors reported by a [`Stepper`](crate::Stepper) and its options
#[derive(Error, Debug)]
pub enum StepperError {
    /// Step count, step size, interval, endpoint or pacing delay is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `retarget` was called before the stepper was activated
    #[error("Stepper has not been activated")]
    NotActivated,

    /// `activate` was called on a stepper that already ran
    #[error("Stepper was already activated")]
    AlreadyActivated,

    /// Options file could not be parsed
    #[error("Failed to parse stepper options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Options could not be serialized
    #[error("Failed to serialize stepper options: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Options file could not be read
    #[error("Failed to read stepper options: {0}")]
    Io(#[from] std::io::Error),
}

impl StepperError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StepperError::InvalidConfiguration(msg.into())
    }
}

/// Result type for stepper operations
pub type Result<T> = std::result::Result<T, StepperError>;
