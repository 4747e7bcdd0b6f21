use http::StatusCode;
use thiserror::Error;

pub mod classifier;

/// Classified failure surfaced to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// no response was received
    #[error("Unable to connect to the server: {message}")]
    NetworkUnreachable { message: String },

    /// 429, or the call outlived the client timeout
    #[error("Server is busy, please wait and try again ({detail})")]
    ServerBusy { detail: String },

    #[error("{message}")]
    ApiError { status: StatusCode, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ClientError::ServerBusy { .. })
    }

    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            ClientError::NetworkUnreachable { .. } => "network",
            ClientError::ServerBusy { .. } => "busy",
            ClientError::ApiError { status, .. } if *status == StatusCode::UNAUTHORIZED => "unauthorized",
            ClientError::ApiError { .. } => "api",
            ClientError::InvalidRequest(_) => "invalid_request",
            ClientError::InvalidResponse(_) => "invalid_response",
        }
    }
}
