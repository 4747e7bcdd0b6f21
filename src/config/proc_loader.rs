use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_validator;
use crate::config::settings::LoggingConfig;
use crate::config::ServiceConfig;
use crate::observability::metrics::get_metrics;

/// Load, expand and validate config from a YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("cannot read config {}: {}", path.display(), e))?;

    let expanded = expand_env_vars(&content)?;
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_errors.inc();
        })?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::default());
    }

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| anyhow!("invalid config: {}", errors.join("; ")))?;

    Ok(service_config)
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    let expanded = re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::{expand_env_vars, parse_config};
    use crate::config::settings::LogFormat;
    use http::Method;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_env_vars_with_defaults() {
        std::env::set_var("AUTH_CLIENT_TEST_HOST", "api.internal");
        std::env::remove_var("AUTH_CLIENT_TEST_MISSING");

        let out = expand_env_vars(
            "base_url: https://${AUTH_CLIENT_TEST_HOST}\ntimeout_ms: ${AUTH_CLIENT_TEST_MISSING:1500}",
        )
        .unwrap();

        assert_eq!(out, "base_url: https://api.internal\ntimeout_ms: 1500");
        std::env::remove_var("AUTH_CLIENT_TEST_HOST");
    }

    #[tokio::test]
    async fn applies_defaults_for_minimal_config() {
        let cfg = parse_config("settings:\n  base_url: https://api.example.com\n".to_owned())
            .await
            .unwrap();

        assert_eq!(cfg.settings.timeout_ms(), 30_000);
        assert_eq!(cfg.settings.logging.unwrap().format, LogFormat::Compact);
        assert_eq!(cfg.auth.refresh_path, "/auth/refresh");
        assert_eq!(cfg.auth.refresh_method, Method::POST);
        assert_eq!(cfg.auth.login_paths, vec!["/auth/login", "/auth/challenge"]);
        assert_eq!(cfg.auth.token_pointer, "/accessToken");
    }

    #[tokio::test]
    async fn rejects_invalid_config_with_all_errors() {
        let yaml = r#"
settings:
  base_url: ftp://files.example.com
auth:
  refresh_path: auth/refresh
  token_pointer: accessToken
"#;
        let err = parse_config(yaml.to_owned()).await.unwrap_err().to_string();

        assert!(err.contains("settings.base_url"), "{err}");
        assert!(err.contains("auth.refresh_path"), "{err}");
        assert!(err.contains("auth.token_pointer"), "{err}");
    }

    #[tokio::test]
    async fn reads_explicit_auth_section() {
        let yaml = r#"
settings:
  base_url: https://api.example.com/v1
  tenant_domain: app.example.com
  timeout_ms: 2500
  logging:
    level: debug
    format: json
auth:
  refresh_path: /session/renew
  refresh_method: PUT
  login_paths: [/session/login]
  token_pointer: /data/token
  account_header: x-wallet
"#;
        let cfg = parse_config(yaml.to_owned()).await.unwrap();

        assert_eq!(cfg.settings.tenant_domain.as_deref(), Some("app.example.com"));
        assert_eq!(cfg.settings.timeout_ms(), 2500);
        assert_eq!(cfg.settings.logging.unwrap().format, LogFormat::Json);
        assert_eq!(cfg.auth.refresh_method, Method::PUT);
        assert_eq!(cfg.auth.login_paths, vec!["/session/login"]);
        assert_eq!(cfg.auth.account_header, "x-wallet");
    }
}
