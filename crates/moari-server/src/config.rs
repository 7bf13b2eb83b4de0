use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{TimeDelta, Utc};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: TimeDelta,
    pub google_client_id: Option<String>,
    pub body_limit_mb: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("MOARI_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MOARI_JWT_SECRET is unset or still a placeholder");
        }

        Ok(Self {
            host: lookup("MOARI_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "MOARI_PORT", 5000)?,
            db_path: lookup("MOARI_DB_PATH")
                .unwrap_or_else(|| "moari.db".into())
                .into(),
            jwt_secret,
            token_ttl: token_ttl(parse_or(&lookup, "MOARI_TOKEN_TTL_DAYS", 30)?)?,
            google_client_id: lookup("MOARI_GOOGLE_CLIENT_ID").filter(|id| !id.trim().is_empty()),
            body_limit_mb: parse_or(&lookup, "MOARI_BODY_LIMIT_MB", 50)?,
        })
    }
}

/// Token lifetime in days. Must be positive and keep expiry timestamps
/// representable.
fn token_ttl(days: i64) -> Result<TimeDelta> {
    if days <= 0 {
        bail!("MOARI_TOKEN_TTL_DAYS must be positive, got {}", days);
    }
    TimeDelta::try_days(days)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .with_context(|| format!("MOARI_TOKEN_TTL_DAYS {} is out of range", days))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value '{}'", key, raw)),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
