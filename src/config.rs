//! Configuration management for the vibeify backend.
//!
//! Configuration is read from environment variables exactly once, at
//! startup, into a [`Config`] that is then shared by every component. Values
//! come from, in order of priority:
//! 1. Environment variables
//! 2. A `.env` file in the working directory
//! 3. A `.env` file in the local data directory (`vibeify/.env`)
//! 4. Application defaults (where applicable)
//!
//! The Spotify client credentials have no default. Without them the
//! process refuses to start.

use std::{fmt, net::SocketAddr, ops::RangeInclusive, path::PathBuf, time::Duration};

use axum_extra::extract::cookie::{Key, SameSite};
use sha2::{Digest, Sha512};
use url::Url;

use crate::{error::Error, spotify::retry::RetryPolicy};

const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-read-recently-played",
    "playlist-read-private",
    "user-read-playback-state",
];

/// Browsers cap cookie lifetimes at 400 days.
const MAX_SESSION_TTL_DAYS: i64 = 400;
const MAX_SWEEP_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Loads `.env` files from the working directory and the local data directory.
///
/// Missing files are skipped. Variables already present in the environment
/// are never overwritten, so the first source that defines a key wins.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/vibeify/.env`
/// - macOS: `~/Library/Application Support/vibeify/.env`
/// - Windows: `%LOCALAPPDATA%/vibeify/.env`
///
/// # Returns
///
/// The list of files that were loaded.
pub fn load_env() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    if let Ok(path) = dotenv::dotenv() {
        loaded.push(path);
    }

    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("vibeify/.env");
    if path.is_file() && dotenv::from_path(&path).is_ok() {
        loaded.push(path);
    }

    loaded
}

/// Runtime configuration resolved once at startup.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub frontend_uri: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub api_url: Url,
    pub scopes: Vec<String>,
    pub bind_addr: SocketAddr,
    pub development: bool,
    pub secure_cookies: bool,
    pub same_site: SameSite,
    pub cookie_key: Key,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub sweep_interval: Duration,
    pub session_ttl_days: i64,
    pub state_ttl_secs: i64,
}

impl Config {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID")
            .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_ID must be set".into()))?;
        let client_secret = get("SPOTIFY_CLIENT_SECRET")
            .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_SECRET must be set".into()))?;

        let development = matches!(
            get("APP_ENV").as_deref(),
            Some("development") | Some("dev") | Some("local"),
        );

        let cookie_key = match get("SESSION_SECRET") {
            Some(secret) => derive_cookie_key(&secret),
            None if development => {
                tracing::warn!("SESSION_SECRET not set, using an ephemeral signing key");
                Key::generate()
            }
            None => return Err(Error::Config("SESSION_SECRET must be set".into())),
        };

        let same_site = match get("COOKIE_SAME_SITE").as_deref() {
            None | Some("lax") => SameSite::Lax,
            Some("strict") => SameSite::Strict,
            Some("none") => SameSite::None,
            Some(other) => {
                return Err(Error::Config(format!(
                    "COOKIE_SAME_SITE: expected strict, lax or none, got '{other}'"
                )));
            }
        };
        // Browsers drop SameSite=None cookies that are not Secure.
        let secure_cookies = !development || same_site == SameSite::None;

        let port: u16 = parse_or(&get, "PORT", 5000)?;
        let bind_addr = match get("SERVER_ADDRESS") {
            Some(addr) => addr
                .parse()
                .map_err(|e| Error::Config(format!("SERVER_ADDRESS: {e}")))?,
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let scopes = match get("SPOTIFY_API_AUTH_SCOPE") {
            Some(raw) => raw
                .split([' ', ','])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let retry = RetryPolicy::new(
            parse_within(&get, "RETRY_MAX_ATTEMPTS", 3u32, 1..=10)?,
            Duration::from_millis(parse_within(&get, "RETRY_BASE_DELAY_MS", 250u64, 0..=60_000)?),
        );
        let request_timeout =
            Duration::from_secs(parse_within(&get, "UPSTREAM_TIMEOUT_SECS", 10u64, 1..=300)?);
        let sweep_interval = Duration::from_secs(parse_within(
            &get,
            "SESSION_SWEEP_INTERVAL_SECS",
            3600u64,
            1..=MAX_SWEEP_INTERVAL_SECS,
        )?);
        let session_ttl_days =
            parse_within(&get, "SESSION_TTL_DAYS", 7i64, 1..=MAX_SESSION_TTL_DAYS)?;
        let state_ttl_secs = parse_within(&get, "STATE_TTL_SECS", 600i64, 1..=86_400)?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: url_or(
                &get,
                "SPOTIFY_REDIRECT_URI",
                "http://127.0.0.1:5000/auth/callback",
            )?,
            frontend_uri: url_or(&get, "FRONTEND_URI", "http://127.0.0.1:3000")?,
            auth_url: url_or(
                &get,
                "SPOTIFY_API_AUTH_URL",
                "https://accounts.spotify.com/authorize",
            )?,
            token_url: url_or(
                &get,
                "SPOTIFY_API_TOKEN_URL",
                "https://accounts.spotify.com/api/token",
            )?,
            api_url: url_or(&get, "SPOTIFY_API_URL", "https://api.spotify.com/v1")?,
            scopes,
            bind_addr,
            development,
            secure_cookies,
            same_site,
            cookie_key,
            request_timeout,
            retry,
            sweep_interval,
            session_ttl_days,
            state_ttl_secs,
        })
    }

    /// Frontend URL with `path` appended to the origin.
    pub fn frontend_url(&self, path: &str) -> String {
        format!("{}{}", self.frontend_uri.as_str().trim_end_matches('/'), path)
    }

    /// Origin of the frontend, as sent in the browser `Origin` header.
    pub fn frontend_origin(&self) -> String {
        self.frontend_uri.origin().ascii_serialization()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("frontend_uri", &self.frontend_uri.as_str())
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("api_url", &self.api_url.as_str())
            .field("scopes", &self.scopes)
            .field("bind_addr", &self.bind_addr)
            .field("development", &self.development)
            .field("secure_cookies", &self.secure_cookies)
            .field("same_site", &self.same_site)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("sweep_interval", &self.sweep_interval)
            .field("session_ttl_days", &self.session_ttl_days)
            .field("state_ttl_secs", &self.state_ttl_secs)
            .finish()
    }
}

/// Stretches an arbitrary secret to the 64 bytes a cookie [`Key`] needs.
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but rejects values outside `range`.
fn parse_within<T, G>(get: &G, key: &str, default: T, range: RangeInclusive<T>) -> Result<T, Error>
where
    T: std::str::FromStr + PartialOrd + fmt::Display,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::Config(format!(
            "{key}: expected a value between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

fn url_or<G>(get: &G, key: &str, default: &str) -> Result<Url, Error>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .as_deref()
        .unwrap_or(default)
        .parse()
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}
