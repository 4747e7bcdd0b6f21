use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::arg;
use clap::command;
use clap::Parser;
use http::Method;
use tenant_auth_client::observability::metrics::get_metrics;
use tenant_auth_client::resilience::retry::RetrySettings;
use tenant_auth_client::utils::config_loader;
use tenant_auth_client::utils::logging;
use tenant_auth_client::utils::logging::LogLevel;
use tenant_auth_client::{AccessToken, ApiClient, ConnectedAccount, PendingRequest};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "auth-client.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// connected account address
    #[arg(long, env = "ACCOUNT")]
    account: Option<String>,
    /// access token to seed for the account
    #[arg(long, env = "ACCESS_TOKEN")]
    token: Option<String>,
    /// JSON request body
    #[arg(long)]
    body: Option<String>,
    /// query parameter as key=value, repeatable
    #[arg(long = "query", value_parser = parse_key_value)]
    query: Vec<(String, String)>,
    /// overrides settings.retry.attempts for busy responses
    #[arg(long)]
    busy_retries: Option<u32>,
    /// dump prometheus metrics to stderr when done
    #[arg(long)]
    print_metrics: bool,
    /// HTTP method, case-insensitive
    #[arg(value_parser = parse_method)]
    method: Method,
    path: String,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid method '{}': {}", raw, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;

    // -------------------------------
    // 2. Create client
    // -------------------------------

    let accounts = Arc::new(ConnectedAccount::new(args.account.clone()));
    let client = ApiClient::from_config(&service_config, accounts)?;

    if let Some(token) = &args.token {
        let account = args
            .account
            .as_deref()
            .ok_or_else(|| anyhow!("--token requires --account"))?;
        client
            .auth_state()
            .tokens
            .set(account, AccessToken::new(token.as_str()))
            .await;
    }

    // -------------------------------
    // 3. Prepare request
    // -------------------------------

    let mut request = PendingRequest::new(args.method.clone(), args.path.clone());
    if let Some(body) = &args.body {
        let body = serde_json::from_str(body).context("--body must be valid JSON")?;
        request = request.json(body);
    }
    for (key, value) in &args.query {
        request = request.query(key.as_str(), value.as_str());
    }

    let mut retry = RetrySettings::from(service_config.settings.retry.as_ref());
    if let Some(attempts) = args.busy_retries {
        retry.attempts = attempts;
    }

    // -------------------------------
    // 4. Send
    // -------------------------------

    info!("{} {} via tenant {}", args.method, args.path, client.tenant_domain());
    let result = retry
        .run_with_retry(|| {
            let client = client.clone();
            let request = request.clone();
            async move { client.request(request).await }
        })
        .await;

    if args.print_metrics {
        eprintln!("{}", get_metrics().await.render());
    }

    let response = result?;
    info!("response status {}", response.status);
    println!("{}", response.text());
    Ok(())
}
