use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use crate::helpers::media::S3Settings;
use crate::helpers::tokens::TokenSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_pool_size: u32,
    pub tokens: TokenSettings,
    pub cors_origin: Option<String>,
    pub upload_dir: PathBuf,
    pub media_dir: PathBuf,
    pub media_public_url: String,
    pub s3: Option<S3Settings>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let host: String = try_load("HOST", "127.0.0.1")?;
        let port: u16 = try_load("PORT", "8000")?;
        let media_public_url = var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{host}:{port}/media"));

        Ok(Config {
            database_url: var("DATABASE_URL"),
            database_pool_size: try_load("DATABASE_POOL_SIZE", "10")?,
            tokens: TokenSettings {
                access_secret: required("ACCESS_TOKEN_SECRET")?,
                access_ttl: load_duration("ACCESS_TOKEN_EXPIRY", "1d")?,
                refresh_secret: required("REFRESH_TOKEN_SECRET")?,
                refresh_ttl: load_duration("REFRESH_TOKEN_EXPIRY", "10d")?,
                bcrypt_cost: try_load("BCRYPT_COST", "10")?,
            },
            cors_origin: var("CORS_ORIGIN").filter(|origin| origin != "*"),
            upload_dir: try_load("UPLOAD_TMP_DIR", &env::temp_dir().to_string_lossy())?,
            media_dir: try_load("MEDIA_DIR", "./media")?,
            media_public_url,
            s3: load_s3()?,
            host,
            port,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

fn load_duration(key: &'static str, default: &str) -> Result<i64, ConfigError> {
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse_duration(&raw).ok_or_else(|| ConfigError::Invalid {
        key,
        reason: format!("`{raw}` is not a positive duration like 30s, 15m, 1h or 10d"),
    })
}

/// Seconds from a humantime duration (`30s`, `15m`, `1h`, `10d`, `1h 30m`) or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let seconds = match raw.parse::<u64>() {
        Ok(seconds) => seconds,
        Err(_) => raw.parse::<humantime::Duration>().ok()?.as_secs(),
    };

    i64::try_from(seconds).ok().filter(|seconds| *seconds > 0)
}

fn load_s3() -> Result<Option<S3Settings>, ConfigError> {
    let Some(bucket) = var("S3_BUCKET") else {
        info!("S3_BUCKET not set, media is kept on local disk");
        return Ok(None);
    };

    Ok(Some(S3Settings {
        bucket,
        region: try_load("S3_REGION", "us-east-1")?,
        endpoint: var("S3_ENDPOINT"),
        access_key: required("S3_KEY")?,
        secret_key: required("S3_SECRET")?,
    }))
}
