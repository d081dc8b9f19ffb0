use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable codes the gallery API attaches to some rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AccountInactive,
    NotVerified,
    #[serde(other)]
    Unknown,
}

/// Error body returned by the gallery API. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Error)]
#[error("{status}: {}", .body.message_or("no message"))]
pub struct ApiException {
    pub status: u16,
    pub body: ApiError,
}

impl ApiException {
    pub fn new(status: u16, body: ApiError) -> Self {
        Self { status, body }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        value.body
    }
}
