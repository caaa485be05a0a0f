use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;
use crate::state::exam::ExamError;
use crate::state::review::ReviewError;
use crate::state::timer::TimerError;

/// Errors surfaced by the service layer to the host UI.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unreachable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No storage backend is installed (degraded mode).
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Storage backend refused the write.
    #[error("storage rejected the write: {0}")]
    Rejected(String),
    /// A durable operation was attempted without a signed-in identity.
    #[error("please sign in: {0}")]
    Unauthorized(String),
    /// The signed-in identity lacks the required entitlement.
    #[error("premium entitlement required: {0}")]
    Forbidden(String),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Not enough data to satisfy the request (e.g. exam pool too small).
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// The operation needs an explicit user confirmation to proceed.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The AI collaborator returned a payload outside the expected shape.
    #[error("could not generate content: {0}")]
    UpstreamFormat(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
            StorageError::Rejected { message } => ServiceError::Rejected(message),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<TimerError> for ServiceError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::InvalidDraft(reason) => ServiceError::InvalidInput(reason),
            TimerError::InvalidConfig(reason) => ServiceError::InvalidInput(reason),
            TimerError::InvalidTransition { .. } => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ExamError> for ServiceError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::InsufficientQuestions { .. } => {
                ServiceError::InsufficientData(err.to_string())
            }
            ExamError::UnansweredQuestions { .. } => {
                ServiceError::ConfirmationRequired(err.to_string())
            }
            ExamError::QuestionIndexOutOfRange { .. } | ExamError::InvalidOption { .. } => {
                ServiceError::InvalidInput(err.to_string())
            }
            ExamError::InvalidTransition { .. } => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ReviewError> for ServiceError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::EmptyCollection => ServiceError::InsufficientData(err.to_string()),
            ReviewError::NotRevealed | ReviewError::SessionFinished => {
                ServiceError::InvalidState(err.to_string())
            }
        }
    }
}
