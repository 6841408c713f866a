use std::time::Duration;

use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Deadline applied to every login/refresh request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ApplicationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server-level URL, used to create throwaway databases in tests.
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    /// HMAC-SHA256 shared secret
    pub signing_key: String,
    pub access_token_expiry_minutes: i64,
    /// bcrypt cost used when salting stored refresh-token hashes
    #[serde(default = "default_refresh_token_hash_cost")]
    pub refresh_token_hash_cost: u32,
}

fn default_refresh_token_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// One year. Access tokens are meant to be short-lived.
pub const MAX_ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 366 * 24 * 60;

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.signing_key".to_string()));
        }
        if !(1..=MAX_ACCESS_TOKEN_EXPIRY_MINUTES).contains(&self.access_token_expiry_minutes) {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.access_token_expiry_minutes must be within 1..={}, got {}",
                MAX_ACCESS_TOKEN_EXPIRY_MINUTES, self.access_token_expiry_minutes
            )));
        }
        if !(4..=31).contains(&self.refresh_token_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.refresh_token_hash_cost must be within 4..=31, got {}",
                self.refresh_token_hash_cost
            )));
        }
        Ok(())
    }
}

// Keep the key out of Debug output.
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("signing_key", &"[redacted]")
            .field("access_token_expiry_minutes", &self.access_token_expiry_minutes)
            .field("refresh_token_hash_cost", &self.refresh_token_hash_cost)
            .finish()
    }
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) overlaid by
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__SIGNING_KEY`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
