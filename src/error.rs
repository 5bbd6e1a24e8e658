//! Error taxonomy for the feedback domain.
//!
//! Timeouts and cancellations normally travel as `Outcome` values through the
//! coordinator; they only become `FeedbackError`s at the service boundary,
//! where the MCP layer turns them into tool errors.

use crate::feedback::validate::Violation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    /// No interactive surface can be opened on this host. Not retried.
    #[error("Interactive environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// Session rejected by the validator. Resolved on the surface, never
    /// returned to the tool caller.
    #[error("Feedback validation failed: {0}")]
    ValidationFailed(Violation),

    #[error("Operation timeout ({0}s), please try again")]
    Timeout(u64),

    #[error("User cancelled feedback submission: {0}")]
    UserCancelled(String),

    #[error("Invalid image attachment: {0}")]
    InvalidAttachment(String),

    #[error("Invalid lifecycle transition: {0}")]
    InvalidTransition(String),

    #[error("A feedback request is already in progress")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedbackError {
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        FeedbackError::Internal(format!("{}: {}", context, err))
    }
}
