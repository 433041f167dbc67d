use std::path::PathBuf;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config,
    error::{CacheError, CatalogError, ConfigError},
};

/// Seconds before expiry at which a token is refreshed.
const EXPIRY_MARGIN_SECS: u64 = 240;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

impl Token {
    /// A token that only carries a refresh token. It counts as expired, so
    /// the first use exchanges it.
    pub fn from_refresh_token(refresh_token: String) -> Self {
        Self {
            access_token: String::new(),
            refresh_token,
            scope: String::new(),
            expires_in: 0,
            obtained_at: 0,
        }
    }
}

pub struct TokenManager {
    token: Token,
    token_url: String,
    client_id: String,
    path: PathBuf,
}

impl TokenManager {
    pub fn new(token: Token, token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        TokenManager {
            token,
            token_url: token_url.into(),
            client_id: client_id.into(),
            path: Self::token_path(),
        }
    }

    /// Stores the token somewhere else than the local data directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Builds the manager from the cached token, falling back to
    /// `SPOTIFY_ACCESS_TOKEN` or `SPOTIFY_REFRESH_TOKEN` from the environment.
    pub async fn from_env() -> Result<Self, ConfigError> {
        let token_url = config::spotify_token_url();
        let client_id = config::spotify_client_id()?;

        if let Ok(token) = Self::load_token(&Self::token_path()).await {
            return Ok(Self::new(token, token_url, client_id));
        }

        let token = match config::spotify_access_token() {
            Some(access_token) => Token {
                access_token,
                refresh_token: config::spotify_refresh_token().unwrap_or_default(),
                scope: String::new(),
                expires_in: 3600,
                obtained_at: Utc::now().timestamp() as u64,
            },
            None => Token::from_refresh_token(
                config::spotify_refresh_token().ok_or(ConfigError::Missing("SPOTIFY_REFRESH_TOKEN"))?,
            ),
        };

        Ok(Self::new(token, token_url, client_id))
    }

    async fn load_token(path: &PathBuf) -> Result<Token, CacheError> {
        let content = async_fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.token)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Returns an access token, refreshing it first when it is about to
    /// expire. A failed refresh falls back to the current token if there is
    /// one.
    pub async fn get_valid_token(&mut self) -> Result<String, CatalogError> {
        if self.is_expired() {
            match self.refresh_token().await {
                Ok(new_token) => {
                    self.token = new_token;
                    if let Err(err) = self.persist().await {
                        tracing::warn!(error = %err, "failed to cache refreshed token");
                    }
                }
                Err(err) if self.token.access_token.is_empty() => return Err(err),
                Err(err) => tracing::warn!(error = %err, "token refresh failed, reusing current token"),
            }
        }

        Ok(self.token.access_token.clone())
    }

    fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as u64;
        let valid_until = (self.token.obtained_at + self.token.expires_in)
            .saturating_sub(EXPIRY_MARGIN_SECS);
        self.token.access_token.is_empty() || now >= valid_until
    }

    async fn refresh_token(&self) -> Result<Token, CatalogError> {
        if self.token.refresh_token.is_empty() {
            return Err(CatalogError::Auth("no refresh token available".to_string()));
        }

        let client = Client::new();
        let res = client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.token.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!("token refresh returned {status}: {body}")));
        }

        let json: serde_json::Value = res.json().await?;
        let access_token = json["access_token"]
            .as_str()
            .ok_or_else(|| CatalogError::Auth("token response without access_token".to_string()))?
            .to_string();

        Ok(Token {
            access_token,
            refresh_token: json["refresh_token"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| self.token.refresh_token.clone()),
            scope: json["scope"].as_str().unwrap_or_default().to_string(),
            expires_in: json["expires_in"].as_u64().unwrap_or(3600),
            obtained_at: Utc::now().timestamp() as u64,
        })
    }

    fn token_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("navispot/cache/token.json");
        path
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }
}
