use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::ClientError;

/// A successful response, body untouched.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>` work for 201/204.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|e| {
            ClientError::InvalidResponse(format!("cannot decode {} response: {}", self.status, e))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
