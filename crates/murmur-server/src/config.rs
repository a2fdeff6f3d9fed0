use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use murmur_media::policy::DEFAULT_MAX_BYTES;

/// Placeholder session secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub session_secret: String,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let session_secret = get("MURMUR_SESSION_SECRET").unwrap_or_default();
        if session_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&session_secret.as_str()) {
            bail!("MURMUR_SESSION_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let host = get("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "MURMUR_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid MURMUR_HOST '{}'", host))?;

        let sweep_interval_secs = parse_or(&get, "MURMUR_SWEEP_INTERVAL_SECS", 300)?;
        if sweep_interval_secs == 0 {
            bail!("MURMUR_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            addr,
            db_path: get("MURMUR_DB_PATH").unwrap_or_else(|| "murmur.db".into()).into(),
            media_dir: get("MURMUR_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            max_upload_bytes: parse_or(&get, "MURMUR_MAX_UPLOAD_BYTES", DEFAULT_MAX_BYTES)?,
            session_secret,
            sweep_interval_secs,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {} '{}'", key, raw)),
        None => Ok(default),
    }
}
