//! Configuration management for navispot.
//!
//! This module handles loading and accessing configuration values from environment
//! variables and `.env` files. It covers the Spotify and Navidrome credentials as
//! well as the defaults of the track matcher.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, path::PathBuf, str::FromStr};

use crate::error::ConfigError;

pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MATCH_CONCURRENCY: usize = 1;
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 500;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the necessary directory structure if it doesn't exist and loads
/// environment variables from a `.env` file located in the platform-specific
/// local data directory under `navispot/.env`. Variables that are already set
/// in the process environment are not overridden.
///
/// # Directory Structure
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/navispot/.env`
/// - macOS: `~/Library/Application Support/navispot/.env`
/// - Windows: `%LOCALAPPDATA%/navispot/.env`
///
/// # Errors
///
/// Returns [`ConfigError::Env`] if the directory cannot be created or the file
/// exists but cannot be parsed. A missing file is not an error.
pub async fn load_env() -> Result<(), ConfigError> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::Env(e.to_string()))?;
    }

    if !path.exists() {
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| ConfigError::Env(e.to_string()))?;
    Ok(())
}

/// Location of the `.env` file read by [`load_env`].
pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("navispot/.env");
    path
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Returns the Spotify Web API base URL.
///
/// Reads `SPOTIFY_API_URL`, defaulting to `https://api.spotify.com/v1`.
pub fn spotify_api_url() -> String {
    optional("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string())
}

/// Returns the Spotify token endpoint used to refresh access tokens.
///
/// Reads `SPOTIFY_API_TOKEN_URL`, defaulting to
/// `https://accounts.spotify.com/api/token`.
pub fn spotify_token_url() -> String {
    optional("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_SPOTIFY_TOKEN_URL.to_string())
}

/// Returns the Spotify application client ID.
///
/// Retrieves the `SPOTIFY_CLIENT_ID` environment variable. The client ID is
/// sent along with the refresh token whenever the access token is renewed.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] if the variable is not set.
pub fn spotify_client_id() -> Result<String, ConfigError> {
    required("SPOTIFY_CLIENT_ID")
}

/// Returns the refresh token used to bootstrap the token cache, if set.
pub fn spotify_refresh_token() -> Option<String> {
    optional("SPOTIFY_REFRESH_TOKEN")
}

/// Returns a pre-issued access token, if set.
///
/// Useful for one-off runs; the token is used until it expires and then
/// renewed through `SPOTIFY_REFRESH_TOKEN` when that is available.
pub fn spotify_access_token() -> Option<String> {
    optional("SPOTIFY_ACCESS_TOKEN")
}

/// Returns the base URL of the Navidrome server.
///
/// Retrieves the `NAVIDROME_URL` environment variable, without a trailing
/// slash.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] if the variable is not set.
///
/// # Example
///
/// ```
/// let url = navidrome_url()?; // e.g., "http://localhost:4533"
/// ```
pub fn navidrome_url() -> Result<String, ConfigError> {
    required("NAVIDROME_URL").map(|url| url.trim_end_matches('/').to_string())
}

/// Returns the Navidrome user name.
pub fn navidrome_username() -> Result<String, ConfigError> {
    required("NAVIDROME_USERNAME")
}

/// Returns the Navidrome password.
///
/// # Security Note
///
/// The password is only sent to the configured server and never logged.
pub fn navidrome_password() -> Result<String, ConfigError> {
    required("NAVIDROME_PASSWORD")
}

/// Returns the minimum fuzzy score for a candidate to count as a match.
///
/// Reads `NAVISPOT_FUZZY_THRESHOLD`, defaulting to `0.8`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the value is not a number between 0
/// and 1.
pub fn fuzzy_threshold() -> Result<f64, ConfigError> {
    let threshold = parsed("NAVISPOT_FUZZY_THRESHOLD", DEFAULT_FUZZY_THRESHOLD)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Invalid {
            key: "NAVISPOT_FUZZY_THRESHOLD",
            value: threshold.to_string(),
        });
    }
    Ok(threshold)
}

/// Returns how many tracks are matched in parallel.
///
/// Reads `NAVISPOT_MATCH_CONCURRENCY`, defaulting to `1` (sequential).
pub fn match_concurrency() -> Result<usize, ConfigError> {
    let concurrency = parsed("NAVISPOT_MATCH_CONCURRENCY", DEFAULT_MATCH_CONCURRENCY)?;
    if concurrency == 0 {
        return Err(ConfigError::Invalid {
            key: "NAVISPOT_MATCH_CONCURRENCY",
            value: concurrency.to_string(),
        });
    }
    Ok(concurrency)
}

/// Returns the upper bound on candidate songs considered per track.
///
/// Reads `NAVISPOT_MAX_SEARCH_RESULTS`, defaulting to `500`.
pub fn max_search_results() -> Result<usize, ConfigError> {
    parsed("NAVISPOT_MAX_SEARCH_RESULTS", DEFAULT_MAX_SEARCH_RESULTS)
}
