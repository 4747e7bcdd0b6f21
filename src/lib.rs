//! # Tenant auth client
//!
//! Authenticated, tenant-aware HTTP client. Every call carries the tenant domain and
//! the connected account's bearer token; an expired token triggers exactly one refresh
//! no matter how many calls fail concurrently, and every such call is replayed once
//! with the new token or rejected together with the refresh.
//!
//! Modules:
//! - `client`: request executor, request/response types
//! - `refresh`: single-flight refresh coordinator and its subscriber queue
//! - `auth`: tokens, per-account token store, account provider, lifecycle events
//! - `errors`: classified client errors and the failure classifier
//! - `config`: YAML configuration, defaults and validation
//! - `observability`: prometheus metrics and the diagnostics sink

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod helpers;
pub mod observability;
pub mod refresh;
pub mod resilience;
#[cfg(test)]
pub mod tests;
pub mod utils;

pub use crate::auth::account::{AccountProvider, ConnectedAccount};
pub use crate::auth::events::{AuthEvent, AuthState};
pub use crate::auth::token::AccessToken;
pub use crate::client::executor::{ApiClient, ApiClientBuilder};
pub use crate::client::request::{FormData, PendingRequest, RequestBody, RequestOptions};
pub use crate::client::response::ApiResponse;
pub use crate::config::ServiceConfig;
pub use crate::errors::ClientError;
