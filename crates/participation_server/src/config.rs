//! Environment-driven server configuration.
//!
//! Every value has a logged default except malformed input, which is a
//! startup error rather than a silent fallback.

use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};
use thiserror::Error;

use crate::middleware::cors::CorsConfig;

pub const DEFAULT_FRONTEND_ORIGIN: &str = "participation-app.vercel.app";
pub const DEFAULT_PRODUCTION_ORIGIN: &str = "https://participation-app.vercel.app";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment profile gating auth, CORS strictness and rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "unknown environment `{other}`; expected development|production|test"
            )),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        };
        write!(f, "{name}")
    }
}

/// Shared-secret API key settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub require_auth: bool,
    pub allowed_keys: Vec<String>,
    /// Requests whose Origin/Referer contains this value skip the key check.
    pub frontend_origin: Option<String>,
}

impl AuthConfig {
    pub fn is_trusted_origin(&self, origin: Option<&str>, referer: Option<&str>) -> bool {
        let Some(frontend) = self.frontend_origin.as_deref() else {
            return false;
        };
        origin.is_some_and(|value| value.contains(frontend))
            || referer.is_some_and(|value| value.contains(frontend))
    }
}

pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limit_enabled: bool,
    pub max_body_bytes: usize,
}

impl Config {
    /// Loads configuration from process environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment: Environment = try_load(&lookup, "APP_ENV", "development")?;
        let port = try_load(&lookup, "PORT", "3000")?;
        let database_url = load_or(&lookup, "DATABASE_URL", "participation.sqlite3");
        let max_body_bytes = try_load(&lookup, "MAX_BODY_BYTES", "16384")?;

        let allowed_keys = split_list(lookup("API_KEYS").as_deref().unwrap_or_default());
        if environment == Environment::Production && allowed_keys.is_empty() {
            warn!("event=config_load module=config status=warn reason=api_keys_empty");
        }

        let allowed_origins = split_list(
            lookup("ALLOWED_ORIGINS")
                .as_deref()
                .unwrap_or(DEFAULT_PRODUCTION_ORIGIN),
        );
        let frontend_origin = Some(load_or(&lookup, "FRONTEND_ORIGIN", DEFAULT_FRONTEND_ORIGIN))
            .filter(|value| !value.is_empty());

        info!(
            "event=config_load module=config status=ok environment={} port={} api_keys={} allowed_origins={}",
            environment,
            port,
            allowed_keys.len(),
            allowed_origins.len()
        );

        Ok(Self {
            environment,
            port,
            database_url,
            auth: AuthConfig {
                require_auth: environment == Environment::Production,
                allowed_keys,
                frontend_origin,
            },
            cors: CorsConfig::for_environment(environment, allowed_origins),
            rate_limit_enabled: environment != Environment::Test,
            max_body_bytes,
        })
    }

    /// Fixed configuration for tests and embedded use.
    pub fn for_environment(environment: Environment, database_url: impl Into<String>) -> Self {
        Self {
            environment,
            port: 0,
            database_url: database_url.into(),
            auth: AuthConfig {
                require_auth: environment == Environment::Production,
                allowed_keys: Vec::new(),
                frontend_origin: Some(DEFAULT_FRONTEND_ORIGIN.to_string()),
            },
            cors: CorsConfig::for_environment(
                environment,
                vec![DEFAULT_PRODUCTION_ORIGIN.to_string()],
            ),
            rate_limit_enabled: environment != Environment::Test,
            max_body_bytes: 16 * 1024,
        }
    }
}

fn load_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).map(|value| value.trim().to_string()).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = load_or(lookup, key, default);
    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            warn!("Invalid {key} value: {err}");
            Err(ConfigError::Invalid {
                key,
                reason: err.to_string(),
                value,
            })
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
