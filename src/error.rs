// src/error.rs
// Error taxonomy shared by every stage of a run. Each variant is a distinct, inspectable outcome;
// none of them is retried or downgraded by the engine.

use thiserror::Error;

/// Result alias used across the engine.
pub type MotionResult<T> = Result<T, MotionError>;

/// Everything that can stop a kinematics or dynamics run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// The position law has no closed-form second derivative.
    #[error("unsupported motion law: {0}")]
    UnsupportedMotionLaw(String),

    /// Nonpositive mass/rod length, non-finite constants, or a malformed sample grid.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The adaptive solver gave up; `last_time` is the last instant it reached with an accepted step.
    #[error("integration diverged after t = {last_time}")]
    IntegrationDivergence { last_time: f64 },

    /// Text that does not parse as a motion-law expression.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

impl MotionError {
    #[must_use]
    pub fn unsupported(details: impl Into<String>) -> Self {
        Self::UnsupportedMotionLaw(details.into())
    }

    #[must_use]
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidParameters(details.into())
    }

    #[must_use]
    pub const fn divergence(last_time: f64) -> Self {
        Self::IntegrationDivergence { last_time }
    }

    #[must_use]
    pub fn invalid_expression(details: impl Into<String>) -> Self {
        Self::InvalidExpression(details.into())
    }

    /// Stable snake_case tag used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMotionLaw(_) => "unsupported_motion_law",
            Self::InvalidParameters(_) => "invalid_parameters",
            Self::IntegrationDivergence { .. } => "integration_divergence",
            Self::InvalidExpression(_) => "invalid_expression",
        }
    }

    /// Time reached before failing, when the error carries one.
    pub fn last_time(&self) -> Option<f64> {
        match self {
            Self::IntegrationDivergence { last_time } => Some(*last_time),
            _ => None,
        }
    }
}
