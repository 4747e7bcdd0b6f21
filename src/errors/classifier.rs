use http::{Method, StatusCode};
use serde_json::Value;

use crate::errors::ClientError;
use crate::observability::diagnostics::{Breadcrumb, DiagnosticsSink};
use crate::utils::constants::{KYC_PATH_MARKER, SERVER_MESSAGE_POINTER};

/// Low-level outcome of a call that did not succeed, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// no response received
    Transport { message: String, timed_out: bool },
    /// a non-2xx response
    Status { status: StatusCode, body: Vec<u8> },
}

impl Failure {
    pub fn from_transport(err: &reqwest::Error) -> Self {
        Failure::Transport {
            message: transport_message(err),
            timed_out: err.is_timeout(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Failure::Status { status, .. } => Some(*status),
            Failure::Transport { .. } => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// reqwest's Display hides the root cause, walk the source chain.
fn transport_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message = format!("{}: {}", message, cause);
        source = cause.source();
    }
    message
}

pub fn classify(failure: &Failure) -> ClientError {
    match failure {
        Failure::Transport { message, timed_out: true } => ClientError::ServerBusy {
            detail: format!("no response before timeout: {}", message),
        },
        Failure::Transport { message, timed_out: false } => ClientError::NetworkUnreachable {
            message: message.to_owned(),
        },
        Failure::Status { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS => {
            ClientError::ServerBusy {
                detail: format!("HTTP {}", status.as_u16()),
            }
        }
        Failure::Status { status, body } => ClientError::ApiError {
            status: *status,
            message: server_message(body)
                .unwrap_or_else(|| format!("HTTP {} error", status.as_u16())),
        },
    }
}

/// Classifies and, for KYC writes, reports the failure to the diagnostics sink first.
pub fn classify_reported(
    method: &Method,
    path: &str,
    failure: &Failure,
    diagnostics: &dyn DiagnosticsSink,
) -> ClientError {
    let error = classify(failure);
    if is_kyc_write(method, path) {
        diagnostics.breadcrumb(Breadcrumb::for_failed_request(
            method,
            path,
            failure.status().map(|s| s.as_u16()),
            &error.to_string(),
        ));
        diagnostics.message(&format!("KYC request {} {} failed: {}", method, path, error));
    }
    error
}

fn is_kyc_write(method: &Method, path: &str) -> bool {
    (method == Method::POST || method == Method::PUT)
        && path.to_ascii_lowercase().contains(KYC_PATH_MARKER)
}

fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .pointer(SERVER_MESSAGE_POINTER)
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
}
