//! Request executor
//!
//! Builds every call with tenant and bearer headers, classifies failures, and routes
//! 401 responses through the single-flight refresh before replaying them once.

use std::sync::Arc;
use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::account::AccountProvider;
use crate::auth::events::{AuthEvent, AuthState};
use crate::auth::token::AccessToken;
use crate::client::request::{FormData, PendingRequest, RequestBody, RequestOptions};
use crate::client::response::ApiResponse;
use crate::config::auth::AuthConfig;
use crate::config::settings::SettingsConfig;
use crate::config::ServiceConfig;
use crate::errors::classifier::{classify_reported, Failure};
use crate::errors::ClientError;
use crate::helpers::time::get_instant;
use crate::observability::diagnostics::{DiagnosticsSink, TracingDiagnostics};
use crate::observability::metrics::get_metrics;
use crate::refresh::coordinator::{RefreshCoordinator, RefreshTicket, ReplayTurn};
use crate::utils::constants::TENANT_HEADER;

static OK_MSG: &str = "ok";
static ERROR_MSG: &str = "error";

/// Authenticated, tenant-aware HTTP client. Cheap to clone; clones share tokens and
/// the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    tenant_domain: HeaderValue,
    auth: AuthConfig,
    account_header: HeaderName,
    state: AuthState,
    accounts: Arc<dyn AccountProvider>,
    coordinator: RefreshCoordinator,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

enum Recovery {
    Propagate,
    Refresh { account: String },
}

pub struct ApiClientBuilder {
    settings: SettingsConfig,
    auth: AuthConfig,
    accounts: Arc<dyn AccountProvider>,
    state: Option<AuthState>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    http: Option<Client>,
}

impl ApiClientBuilder {
    /// Share tokens and event listeners with another client.
    pub fn auth_state(mut self, state: AuthState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Replaces the default client (cookie store on, configured timeout).
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base = Url::parse(&self.settings.base_url).map_err(|e| {
            ClientError::InvalidRequest(format!("base url '{}': {}", self.settings.base_url, e))
        })?;

        let tenant_domain = match &self.settings.tenant_domain {
            Some(domain) => domain.to_owned(),
            None => host_of(&base)?,
        };
        let tenant_domain = HeaderValue::from_str(&tenant_domain)
            .map_err(|e| ClientError::InvalidRequest(format!("tenant domain: {}", e)))?;
        let account_header = HeaderName::from_bytes(self.auth.account_header.as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("account header: {}", e)))?;

        let http = match self.http {
            Some(client) => client,
            None => Client::builder()
                .timeout(Duration::from_millis(self.settings.timeout_ms()))
                // refresh credentials travel as cookies
                .cookie_store(true)
                .build()
                .map_err(|e| ClientError::InvalidRequest(format!("http client: {}", e)))?,
        };

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: self.settings.base_url.trim_end_matches('/').to_owned(),
                tenant_domain,
                auth: self.auth,
                account_header,
                state: self.state.unwrap_or_default(),
                accounts: self.accounts,
                coordinator: RefreshCoordinator::new(),
                diagnostics: self
                    .diagnostics
                    .unwrap_or_else(|| Arc::new(TracingDiagnostics)),
            }),
        })
    }
}

fn host_of(url: &Url) -> Result<String, ClientError> {
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidRequest(format!("base url '{}' has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_owned(),
    })
}

impl ApiClient {
    pub fn builder(
        settings: SettingsConfig,
        auth: AuthConfig,
        accounts: Arc<dyn AccountProvider>,
    ) -> ApiClientBuilder {
        ApiClientBuilder {
            settings,
            auth,
            accounts,
            state: None,
            diagnostics: None,
            http: None,
        }
    }

    pub fn from_config(
        config: &ServiceConfig,
        accounts: Arc<dyn AccountProvider>,
    ) -> Result<Self, ClientError> {
        Self::builder(config.settings.clone(), config.auth.clone(), accounts).build()
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.inner.state
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    pub fn tenant_domain(&self) -> &str {
        self.inner.tenant_domain.to_str().unwrap_or_default()
    }

    /// Uniform call surface: returns the response body untouched or a classified error.
    pub async fn request(&self, req: PendingRequest) -> Result<ApiResponse, ClientError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        let method = req.method.clone();
        let path = req.path.clone();

        let result = self.execute(req).await;

        metrics
            .request_duration
            .with_label_values(&[method.as_str()])
            .observe(start.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => OK_MSG,
            Err(err) => err.outcome_label(),
        };
        metrics
            .requests
            .with_label_values(&[method.as_str(), outcome])
            .inc();
        if let Err(err) = &result {
            debug!("{} {} failed: {}", method, path, err);
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(PendingRequest::new(Method::GET, path).with_options(options))
            .await?
            .json()
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(PendingRequest::new(Method::DELETE, path).with_options(options))
            .await?
            .json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.send_json(Method::POST, path, body, options).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.send_json(Method::PUT, path, body, options).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.send_json(Method::PATCH, path, body, options).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormData,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        self.request(
            PendingRequest::new(Method::POST, path)
                .form(form)
                .with_options(options),
        )
        .await?
        .json()
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("cannot serialize body: {}", e)))?;
        self.request(
            PendingRequest::new(method, path)
                .json(body)
                .with_options(options),
        )
        .await?
        .json()
    }

    async fn execute(&self, req: PendingRequest) -> Result<ApiResponse, ClientError> {
        let built = self.build(&req, None).await?;
        match self.send(built, None).await {
            Ok(response) => Ok(response),
            Err(failure) => self.recover(req, failure).await,
        }
    }

    /// Decides whether a failed call may go through a refresh. Marks it retried when it does.
    fn triage(&self, req: &mut PendingRequest, failure: &Failure) -> Recovery {
        if !failure.is_unauthorized() {
            return Recovery::Propagate;
        }
        let auth = &self.inner.auth;
        if auth.is_login_path(&req.path) {
            debug!("401 from login endpoint {}, not refreshing", req.path);
            return Recovery::Propagate;
        }
        if req.is_retried() {
            debug!("401 after a refresh for {} {}, giving up", req.method, req.path);
            return Recovery::Propagate;
        }
        req.mark_retried();
        if auth.is_refresh_path(&req.path) {
            debug!("401 from refresh endpoint {}, not refreshing", req.path);
            return Recovery::Propagate;
        }
        match self.inner.accounts.current_account() {
            Some(account) => Recovery::Refresh { account },
            None => {
                debug!("401 with no connected account, not refreshing");
                Recovery::Propagate
            }
        }
    }

    async fn recover(
        &self,
        mut req: PendingRequest,
        failure: Failure,
    ) -> Result<ApiResponse, ClientError> {
        let account = match self.triage(&mut req, &failure) {
            Recovery::Propagate => return Err(self.reject(&req, &failure)),
            Recovery::Refresh { account } => account,
        };

        match self.inner.coordinator.join() {
            RefreshTicket::Leader { lease, turn } => {
                let state = &self.inner.state;
                state.publish(AuthEvent::RefreshPending {
                    account: account.clone(),
                });

                match self.refresh_token(&account).await {
                    Ok(token) => {
                        state.tokens.set(&account, token.clone()).await;
                        state.publish(AuthEvent::RefreshSucceeded {
                            account: account.clone(),
                            token: token.clone(),
                        });
                        lease.settle(Some(token.clone()));
                        self.replay(req, &token, turn).await
                    }
                    Err(err) => {
                        lease.settle(None);
                        // a 401 from the refresh endpoint rejects without the failure notification
                        if !err.is_unauthorized() {
                            state.publish(AuthEvent::RefreshFailed {
                                account,
                                message: err.to_string(),
                            });
                        }
                        Err(err)
                    }
                }
            }
            RefreshTicket::Follower { pending, turn } => match pending.outcome().await {
                Some(token) => self.replay(req, &token, turn).await,
                None => Err(self.reject(&req, &failure)),
            },
        }
    }

    async fn refresh_token(&self, account: &str) -> Result<AccessToken, ClientError> {
        let metrics = get_metrics().await;
        let auth = &self.inner.auth;
        let account_value = HeaderValue::from_str(account)
            .map_err(|e| ClientError::InvalidRequest(format!("account header value: {}", e)))?;
        let req = PendingRequest::new(auth.refresh_method.clone(), auth.refresh_path.clone())
            .header(self.inner.account_header.clone(), account_value);

        info!("refreshing access token for account {}", account);
        let built = self.build(&req, None).await?;
        let response = match self.send(built, None).await {
            Ok(response) => response,
            Err(failure) => {
                let result = if failure.is_unauthorized() { "unauthorized" } else { ERROR_MSG };
                metrics.refreshes.with_label_values(&[result]).inc();
                let err = self.reject(&req, &failure);
                warn!("token refresh for account {} failed: {}", account, err);
                return Err(err);
            }
        };

        let token = response
            .json::<Value>()?
            .pointer(&auth.token_pointer)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "refresh response has no token at '{}'",
                    auth.token_pointer
                ))
            });

        match &token {
            Ok(token) => {
                metrics.refreshes.with_label_values(&[OK_MSG]).inc();
                info!(
                    "access token refreshed for account {}, expires at {:?}",
                    account, token.expires_at
                );
            }
            Err(err) => {
                metrics.refreshes.with_label_values(&[ERROR_MSG]).inc();
                warn!("token refresh for account {} failed: {}", account, err);
            }
        }
        token
    }

    /// Re-issues the call with the refreshed token once every call queued ahead of it
    /// has been answered; its outcome is final.
    async fn replay(
        &self,
        req: PendingRequest,
        token: &AccessToken,
        mut turn: ReplayTurn,
    ) -> Result<ApiResponse, ClientError> {
        let metrics = get_metrics().await;
        let built = self.build(&req, Some(token)).await?;
        turn.wait().await;
        debug!("replaying {} {} with refreshed token", req.method, req.path);
        let result = match self.send(built, Some(turn)).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self.reject(&req, &failure)),
        };
        let label = if result.is_ok() { OK_MSG } else { ERROR_MSG };
        metrics.replays.with_label_values(&[label]).inc();
        result
    }

    fn reject(&self, req: &PendingRequest, failure: &Failure) -> ClientError {
        classify_reported(
            &req.method,
            &req.path,
            failure,
            self.inner.diagnostics.as_ref(),
        )
    }

    async fn current_token(&self) -> Option<AccessToken> {
        let account = self.inner.accounts.current_account()?;
        self.inner.state.tokens.get(&account).await
    }

    fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        };
        Url::parse(&raw).map_err(|e| ClientError::InvalidRequest(format!("url '{}': {}", raw, e)))
    }

    /// `token_override` is the refreshed token on replay; it wins over every other source.
    async fn build(
        &self,
        req: &PendingRequest,
        token_override: Option<&AccessToken>,
    ) -> Result<reqwest::Request, ClientError> {
        let mut builder = self
            .inner
            .http
            .request(req.method.clone(), self.url_for(&req.path)?);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, self.inner.tenant_domain.clone());

        let token = match token_override {
            Some(token) => Some(token.clone()),
            None => self.current_token().await,
        };
        if let Some(token) = &token {
            headers.insert(AUTHORIZATION, bearer_value(token)?);
        }

        match &req.body {
            Some(RequestBody::Json(value)) => {
                let bytes = serde_json::to_vec(value).map_err(|e| {
                    ClientError::InvalidRequest(format!("cannot serialize body: {}", e))
                })?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                builder = builder.body(bytes);
            }
            // reqwest sets the multipart content type with its boundary
            Some(RequestBody::Form(form)) => builder = builder.multipart(form.to_multipart()?),
            None => {}
        }

        for name in req.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in req.headers.iter() {
            headers.append(name, value.clone());
        }
        if let Some(token) = token_override {
            headers.insert(AUTHORIZATION, bearer_value(token)?);
        }

        builder
            .headers(headers)
            .build()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))
    }

    /// `turn` is released as soon as the response head arrives, or the call fails.
    async fn send(
        &self,
        request: reqwest::Request,
        turn: Option<ReplayTurn>,
    ) -> Result<ApiResponse, Failure> {
        let response = self.inner.http.execute(request).await;
        if let Some(turn) = turn {
            turn.release();
        }
        let response = response.map_err(|e| Failure::from_transport(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Failure::from_transport(&e))?
            .to_vec();

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(Failure::Status { status, body })
        }
    }
}

fn bearer_value(token: &AccessToken) -> Result<HeaderValue, ClientError> {
    let mut value = HeaderValue::from_str(&token.bearer())
        .map_err(|e| ClientError::InvalidRequest(format!("access token: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}
