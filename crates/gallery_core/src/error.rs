use shared::domain::ImageId;
use thiserror::Error;

use crate::reconcile::{Mode, PendingOp};

pub type GalleryResult<T> = Result<T, GalleryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GalleryError {
    /// An id the caller guaranteed to be present is missing from the working
    /// set. Always a defect.
    #[error("image {0} is not part of the collection")]
    NotFound(ImageId),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("operation requires {expected:?} mode but gallery is {actual:?}")]
    WrongMode { expected: Mode, actual: Mode },
    #[error("a {0} request is already in flight")]
    Busy(PendingOp),
    #[error("no {0} request is in flight")]
    NotPending(PendingOp),
    /// The session was terminated while this request was out; its response
    /// was discarded.
    #[error("session ended while a {0} request was in flight")]
    SessionEnded(PendingOp),
    #[error("a drag of image {0} is already in progress")]
    DragInProgress(ImageId),
    #[error("no drag in progress")]
    NoActiveDrag,
    #[error("image {0} is not on the current page")]
    NotOnPage(ImageId),
}

impl GalleryError {
    /// Failures the user may retry with the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Validation(_))
    }

    /// Failures that end the session; in-memory gallery state must be dropped.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::SessionEnded(_))
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("failed to connect: {err}"))
        } else if err.is_decode() {
            Self::Transport(format!("malformed response body: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
