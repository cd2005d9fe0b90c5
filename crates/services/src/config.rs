//! Environment-driven configuration.

use std::env;

use course_core::grading::{GradingError, PassingPolicy};
use thiserror::Error;

pub const DEFAULT_DB_URL: &str = "sqlite://course.sqlite3";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error(transparent)]
    PassingScore(#[from] GradingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    /// Threshold deciding `passed`; there is no built-in default.
    pub passing_policy: PassingPolicy,
    /// Maximum results per (student, exam); `None` allows unlimited retakes.
    pub max_attempts: Option<u32>,
    pub rust_log: String,
}

impl AppConfig {
    /// Load configuration from the process environment, reading a `.env`
    /// file first when one is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("COURSE_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.to_owned());

        let passing_raw = lookup("COURSE_PASSING_SCORE").ok_or(ConfigError::Missing(
            "COURSE_PASSING_SCORE",
        ))?;
        let threshold = parse_u32("COURSE_PASSING_SCORE", &passing_raw)?;
        let passing_policy = PassingPolicy::new(threshold)?;

        let max_attempts = match lookup("COURSE_MAX_ATTEMPTS") {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => match parse_u32("COURSE_MAX_ATTEMPTS", &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        var: "COURSE_MAX_ATTEMPTS",
                        value: raw,
                    });
                }
                n => Some(n),
            },
        };

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());

        Ok(Self {
            database_url,
            passing_policy,
            max_attempts,
            rust_log,
        })
    }
}

fn parse_u32(var: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_owned(),
    })
}
