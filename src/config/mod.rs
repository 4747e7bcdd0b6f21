use serde::Deserialize;

use crate::config::auth::AuthConfig;
use crate::config::settings::SettingsConfig;

pub mod auth;
pub mod proc_loader;
pub mod proc_validator;
pub mod settings;

/// ================================
/// Full client configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}
