//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - base url, tenant domain and timeout sanity
//! - auth endpoint paths, token pointer, header names
//! - retry invariants

use http::HeaderName;
use reqwest::Url;
use tracing::{error, info};

use crate::config::auth::AuthConfig;
use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::ServiceConfig;
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_auth(&cfg.auth, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    match Url::parse(&settings.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if url.host_str().is_none() {
                errors.push(format!("settings.base_url '{}' has no host", settings.base_url));
            }
        }
        Ok(url) => errors.push(format!(
            "settings.base_url '{}' must use http or https, got '{}'",
            settings.base_url,
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "settings.base_url '{}' is not a valid url: {}",
            settings.base_url, e
        )),
    }

    if let Some(domain) = &settings.tenant_domain {
        if domain.trim().is_empty() {
            errors.push("settings.tenant_domain must not be empty when provided".to_string());
        }
    }

    if settings.timeout_ms == Some(0) {
        errors.push("settings.timeout_ms must be > 0".to_string());
    }

    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

/// AUTH VALIDATION
fn validate_auth(auth: &AuthConfig, errors: &mut Vec<String>) {
    validate_path("auth.refresh_path", &auth.refresh_path, errors);

    if auth.login_paths.is_empty() {
        errors.push("auth.login_paths must contain at least one path".to_string());
    }
    for (i, login) in auth.login_paths.iter().enumerate() {
        validate_path(&format!("auth.login_paths[{}]", i), login, errors);
        if login == &auth.refresh_path {
            errors.push(format!(
                "auth.login_paths[{}] '{}' must differ from auth.refresh_path",
                i, login
            ));
        }
    }

    // serde_json::Value::pointer only accepts "" or "/..."
    if !auth.token_pointer.starts_with('/') {
        errors.push(format!(
            "auth.token_pointer '{}' must be a JSON pointer starting with '/'",
            auth.token_pointer
        ));
    }

    if HeaderName::from_bytes(auth.account_header.as_bytes()).is_err() {
        errors.push(format!(
            "auth.account_header '{}' is not a valid header name",
            auth.account_header
        ));
    }
}

fn validate_path(path: &str, value: &str, errors: &mut Vec<String>) {
    if !value.starts_with('/') {
        errors.push(format!("{} '{}' must start with '/'", path, value));
    }
}
