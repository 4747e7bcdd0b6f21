//! Shared constants and invariants

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

// Auth endpoints
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_CHALLENGE_PATH: &str = "/auth/challenge";
pub const DEFAULT_TOKEN_POINTER: &str = "/accessToken";

// Headers
pub const TENANT_HEADER: &str = "x-tenant-domain";
pub const DEFAULT_ACCOUNT_HEADER: &str = "x-account-address";

// Error classification
pub const KYC_PATH_MARKER: &str = "kyc";
pub const SERVER_MESSAGE_POINTER: &str = "/message";
