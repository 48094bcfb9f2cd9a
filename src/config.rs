//! Process configuration, read once from the environment at startup.

use std::env;

use anyhow::{Context, Result};

use crate::domain::stream::serialize::DatetimeFormat;

/// Settings the request path depends on.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Default page size for list views.
    pub list_limit: usize,
    /// Default page size for datapoints on detail views.
    pub detail_limit: usize,
    /// Hard cap on any client-provided limit.
    pub max_limit: usize,
    pub datetime_format: DatetimeFormat,
}

impl Default for ApiConfig {
    fn default() -> ApiConfig {
        ApiConfig {
            list_limit: 20,
            detail_limit: 100,
            max_limit: 1000,
            datetime_format: DatetimeFormat::Rfc3339,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub api: ApiConfig,
    /// Number of demo streams to seed into the in-memory backend at
    /// startup; 0 starts empty.
    pub demo_streams: usize,
    /// Datapoints per seeded demo stream.
    pub demo_points: usize,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let defaults = ApiConfig::default();

        let datetime_format = match env::var("DATASTREAM_DATETIME_FORMAT") {
            Ok(value) => DatetimeFormat::from_config(&value).with_context(|| {
                format!("unknown DATASTREAM_DATETIME_FORMAT '{value}' (rfc-3339 or rfc-2822)")
            })?,
            Err(_) => defaults.datetime_format,
        };

        Ok(Config {
            bind_addr: env::var("DATASTREAM_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            api: ApiConfig {
                list_limit: env_usize("DATASTREAM_LIST_LIMIT", defaults.list_limit)?,
                detail_limit: env_usize("DATASTREAM_DETAIL_LIMIT", defaults.detail_limit)?,
                max_limit: env_usize("DATASTREAM_MAX_LIMIT", defaults.max_limit)?,
                datetime_format,
            },
            demo_streams: env_usize("DATASTREAM_DEMO_STREAMS", 0)?,
            demo_points: env_usize("DATASTREAM_DEMO_POINTS", 3600)?,
        })
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{value}'")),
        Err(_) => Ok(default),
    }
}
