use http::Method;
use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_ACCOUNT_HEADER, DEFAULT_CHALLENGE_PATH, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH,
    DEFAULT_TOKEN_POINTER,
};

/// ================================
/// Auth endpoints and refresh contract
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_refresh_method", with = "http_serde::method")]
    pub refresh_method: Method,
    /// 401 on any of these is surfaced as is, they never trigger a refresh
    #[serde(default = "default_login_paths")]
    pub login_paths: Vec<String>,
    /// JSON pointer to the access token in the refresh response body
    #[serde(default = "default_token_pointer")]
    pub token_pointer: String,
    /// header carrying the connected account on the refresh call
    #[serde(default = "default_account_header")]
    pub account_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            refresh_method: default_refresh_method(),
            login_paths: default_login_paths(),
            token_pointer: default_token_pointer(),
            account_header: default_account_header(),
        }
    }
}

impl AuthConfig {
    pub fn is_login_path(&self, path: &str) -> bool {
        self.login_paths
            .iter()
            .any(|login| is_endpoint(path, login))
    }

    pub fn is_refresh_path(&self, path: &str) -> bool {
        is_endpoint(path, &self.refresh_path)
    }
}

/// True when the request path ends with every segment of `endpoint`.
/// Query, fragment and scheme/host of absolute URLs are ignored.
fn is_endpoint(path: &str, endpoint: &str) -> bool {
    let path = request_path(path).trim_end_matches('/');
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.is_empty() || endpoint == "/" {
        return false;
    }
    path.ends_with(endpoint) || path == endpoint.trim_start_matches('/')
}

fn request_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map(|start| &rest[start..]).unwrap_or("/")
        }
        None => path,
    }
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_owned()
}

fn default_refresh_method() -> Method {
    Method::POST
}

fn default_login_paths() -> Vec<String> {
    vec![DEFAULT_LOGIN_PATH.to_owned(), DEFAULT_CHALLENGE_PATH.to_owned()]
}

fn default_token_pointer() -> String {
    DEFAULT_TOKEN_POINTER.to_owned()
}

fn default_account_header() -> String {
    DEFAULT_ACCOUNT_HEADER.to_owned()
}
