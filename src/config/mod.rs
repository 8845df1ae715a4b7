use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::calendar::YearKey;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub calendar: CalendarConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub plan_catalog_path: String,
    /// Plan used when a request does not name a year of study.
    pub default_year: YearKey,
}

// Feature flags
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_rate_limiting: bool,
    pub enable_response_cache: bool,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn or_default(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(name, default);
    value.parse().map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0"),
                port: parsed("PORT", "8000")?,
                environment: or_default("ENVIRONMENT", "development"),
                rust_log: or_default("RUST_LOG", "caseway_planner=debug,tower_http=debug"),
                log_json: parsed("LOG_JSON", "false")?,
                cors_origins: or_default("CORS_ORIGINS", "")
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed("DB_POOL_SIZE", "20")?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
                cache_ttl_secs: parsed("CACHE_TTL_SECS", "60")?,
            },
            auth: AuthConfig {
                jwt_secret: required("JWT_SECRET")?,
                audience: env::var("JWT_AUDIENCE").ok().filter(|a| !a.is_empty()),
            },
            rate_limit: RateLimitConfig {
                window_secs: parsed("RATE_LIMIT_WINDOW_SECS", "60")?,
                max_requests: parsed("RATE_LIMIT_MAX_REQUESTS", "120")?,
            },
            calendar: CalendarConfig {
                plan_catalog_path: or_default("PLAN_CATALOG_PATH", "data/plans/durham_llb_2025_26.json"),
                default_year: parsed("DEFAULT_YEAR", "year1")?,
            },
            features: FeatureFlags {
                enable_rate_limiting: parsed("ENABLE_RATE_LIMITING", "true")?,
                enable_response_cache: parsed("ENABLE_RESPONSE_CACHE", "true")?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }

    /// Production always logs JSON; elsewhere `LOG_JSON` decides.
    pub fn json_logs(&self) -> bool {
        self.app.log_json || self.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str, log_json: bool) -> Config {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                environment: environment.to_string(),
                rust_log: "caseway_planner=debug".to_string(),
                log_json,
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig { url: "postgres://localhost/planner".to_string(), pool_size: 5 },
            redis: RedisConfig { url: "redis://localhost".to_string(), cache_ttl_secs: 60 },
            auth: AuthConfig { jwt_secret: "secret".to_string(), audience: None },
            rate_limit: RateLimitConfig { window_secs: 60, max_requests: 120 },
            calendar: CalendarConfig {
                plan_catalog_path: "data/plans/durham_llb_2025_26.json".to_string(),
                default_year: YearKey::Year1,
            },
            features: FeatureFlags { enable_rate_limiting: true, enable_response_cache: true },
        }
    }

    #[test]
    fn production_forces_json_logs() {
        assert!(config("Production", false).is_production());
        assert!(config("production", false).json_logs());
        assert!(!config("development", false).json_logs());
        assert!(config("development", true).json_logs());
    }
}
