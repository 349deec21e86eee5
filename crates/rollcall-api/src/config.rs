#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
// parse_bounded enforces ranges well inside the target types

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub auth_clock_skew: Duration,
    pub rate_limit_window: Duration,
    pub sync_rate_limit_per_window: u32,
    pub recognition_rate_limit_per_window: u32,
    pub max_sync_batch: usize,
    pub attendance_retention_days: i64,
    pub record_commit_timeout: Duration,
    pub face_api: Option<FaceApiConfig>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct FaceApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl fmt::Debug for FaceApiConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FaceApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "sync_rate_limit_per_window",
                &self.sync_rate_limit_per_window,
            )
            .field(
                "recognition_rate_limit_per_window",
                &self.recognition_rate_limit_per_window,
            )
            .field("max_sync_batch", &self.max_sync_batch)
            .field("attendance_retention_days", &self.attendance_retention_days)
            .field("record_commit_timeout", &self.record_commit_timeout)
            .field("face_api", &self.face_api)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "ROLLCALL_BIND_ADDR", "127.0.0.1:8080");
        let database_path = value_or_default(&lookup, "ROLLCALL_DATABASE_PATH", "rollcall.db");

        let jwt_secret = required_trimmed(&lookup, "ROLLCALL_JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "ROLLCALL_JWT_SECRET must be at least 32 bytes".to_string(),
            ));
        }
        let jwt_issuer = value_or_default(&lookup, "ROLLCALL_JWT_ISSUER", "rollcall-auth");
        let jwt_audience = value_or_default(&lookup, "ROLLCALL_JWT_AUDIENCE", "rollcall-api");

        let auth_clock_skew_secs = parse_bounded(
            &lookup,
            "AUTH_CLOCK_SKEW_SECS",
            "60",
            0,
            300,
        )?;
        let rate_limit_window_secs = parse_bounded(
            &lookup,
            "RATE_LIMIT_WINDOW_SECS",
            "60",
            10,
            3_600,
        )?;
        let sync_rate_limit_per_window = parse_bounded(
            &lookup,
            "SYNC_RATE_LIMIT_PER_WINDOW",
            "20",
            1,
            1_000,
        )?;
        let recognition_rate_limit_per_window = parse_bounded(
            &lookup,
            "RECOGNITION_RATE_LIMIT_PER_WINDOW",
            "120",
            1,
            5_000,
        )?;
        let max_sync_batch = parse_bounded(&lookup, "MAX_SYNC_BATCH", "100", 1, 500)?;
        let attendance_retention_days = parse_bounded(
            &lookup,
            "ATTENDANCE_RETENTION_DAYS",
            "30",
            1,
            365,
        )?;
        let record_commit_timeout_ms = parse_bounded(
            &lookup,
            "RECORD_COMMIT_TIMEOUT_MS",
            "5000",
            100,
            60_000,
        )?;

        let face_api = parse_face_api_config(&lookup)?;

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_rate_limit_per_window: sync_rate_limit_per_window as u32,
            recognition_rate_limit_per_window: recognition_rate_limit_per_window as u32,
            max_sync_batch: max_sync_batch as usize,
            attendance_retention_days: attendance_retention_days as i64,
            record_commit_timeout: Duration::from_millis(record_commit_timeout_ms),
            face_api,
        })
    }
}

fn parse_face_api_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<FaceApiConfig>, ConfigError> {
    let base_url = optional_trimmed(&lookup, "FACE_API_URL");
    let api_key = optional_trimmed(&lookup, "FACE_API_KEY");

    let any_set = base_url.is_some() || api_key.is_some();
    if !any_set {
        return Ok(None);
    }

    let base_url = base_url.ok_or(ConfigError::MissingVar("FACE_API_URL"))?;
    let api_key = api_key.ok_or(ConfigError::MissingVar("FACE_API_KEY"))?;

    if !is_http_url(&base_url) {
        return Err(ConfigError::Invalid(
            "FACE_API_URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(Some(FaceApiConfig {
        base_url: trim_trailing(&base_url).to_string(),
        api_key,
    }))
}

fn parse_bounded(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = value_or_default(lookup, name, default)
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
        })?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}
