//! Client configuration loaded from the environment.
//!
//! The binary calls `dotenvy::dotenv()` first, so every variable below can
//! also live in a `.env` file next to the executable.

use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";
pub const DEFAULT_SESSION_DIR: &str = ".booking_session";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin. Always ends with `/` so relative paths join under it.
    pub base_url: Url,
    /// Deadline for a whole `send`, refresh and retry included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Directory holding the credential files. `None` keeps the session in memory.
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            session_dir: Some(PathBuf::from(DEFAULT_SESSION_DIR)),
        }
    }
}

impl ClientConfig {
    /// Reads `BOOKING_API_URL`, `BOOKING_REQUEST_TIMEOUT_SECS`,
    /// `BOOKING_CONNECT_TIMEOUT_SECS` and `BOOKING_SESSION_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("BOOKING_API_URL") {
            config.base_url = parse_base_url(&raw)?;
        }
        if let Some(raw) = lookup("BOOKING_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("BOOKING_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BOOKING_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("BOOKING_CONNECT_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BOOKING_SESSION_DIR") {
            config.session_dir = if raw.is_empty() {
                None
            } else {
                Some(PathBuf::from(raw))
            };
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, raw: &str) -> Result<Self> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }

    pub fn with_session_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.session_dir = dir;
        self
    }
}

/// Parses an http(s) origin and appends the trailing `/` that `Url::join`
/// needs to keep the last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    let url = Url::parse(&normalized).with_context(|| format!("invalid base url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("base url '{raw}' must use http or https");
    }
    Ok(url)
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a whole number of seconds, got '{raw}'"))?;
    if secs == 0 {
        bail!("{name} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
