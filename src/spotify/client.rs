use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::{sync::Mutex, time::sleep};

use crate::{
    catalog::SourceCatalog,
    config,
    error::{CatalogError, ConfigError},
    management::TokenManager,
    types::{SourcePlaylist, SourceTrack},
};

const PLAYLIST_PAGE_SIZE: u32 = 50;
const PLAYLIST_TRACKS_PAGE_SIZE: u32 = 100;
const SAVED_TRACKS_PAGE_SIZE: u32 = 50;
const MAX_ATTEMPTS: u32 = 3;
const BAD_GATEWAY_DELAY: Duration = Duration::from_secs(10);
const MAX_RETRY_AFTER_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackTotal {
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    snapshot_id: Option<String>,
    #[serde(default)]
    tracks: Option<TrackTotal>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<NamedObject>,
    album: Option<NamedObject>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    external_ids: Option<ExternalIds>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    is_local: bool,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    track: Option<TrackObject>,
    #[serde(default)]
    is_local: bool,
}

impl TrackItem {
    /// Local files and podcast episodes cannot be matched and are dropped.
    fn into_source_track(self) -> Option<SourceTrack> {
        let track = self.track?;
        if self.is_local || track.is_local || track.kind.as_deref() == Some("episode") {
            return None;
        }

        Some(SourceTrack {
            id: track.id?,
            title: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album: track.album.map(|a| a.name).unwrap_or_default(),
            duration_ms: track.duration_ms,
            isrc: track.external_ids.and_then(|ids| ids.isrc),
        })
    }
}

/// Spotify Web API client reading playlists and liked songs.
pub struct SpotifyClient {
    http: Client,
    base_url: String,
    tokens: Mutex<TokenManager>,
}

impl SpotifyClient {
    pub fn new(base_url: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: Mutex::new(tokens),
        }
    }

    pub async fn from_env() -> Result<Self, ConfigError> {
        let tokens = TokenManager::from_env().await?;
        Ok(Self::new(config::spotify_api_url(), tokens))
    }

    async fn send(&self, url: &str) -> Result<Response, CatalogError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = self.tokens.lock().await.get_valid_token().await?;
            let response = self.http.get(url).bearer_auth(&token).send().await?;

            match response.status() {
                StatusCode::BAD_GATEWAY if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(url, attempt, "bad gateway, retrying");
                    sleep(BAD_GATEWAY_DELAY).await;
                }
                StatusCode::TOO_MANY_REQUESTS if attempt < MAX_ATTEMPTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<u64>().ok())
                        .unwrap_or(1);
                    if retry_after > MAX_RETRY_AFTER_SECS {
                        return Err(CatalogError::Api {
                            status: 429,
                            message: format!("rate limited for {retry_after} seconds"),
                        });
                    }
                    tracing::debug!(url, retry_after, "rate limited, waiting");
                    sleep(Duration::from_secs(retry_after)).await;
                }
                status if status.is_success() => return Ok(response),
                status => {
                    let message = response.text().await.unwrap_or_default();
                    return Err(CatalogError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let body = self.send(url).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Follows `next` links until the last page.
    async fn collect_pages<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.items.into_iter().flatten());
            next = page.next;
        }

        Ok(items)
    }
}

#[async_trait]
impl SourceCatalog for SpotifyClient {
    async fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, CatalogError> {
        let url = format!(
            "{base}/me/playlists?limit={limit}",
            base = self.base_url,
            limit = PLAYLIST_PAGE_SIZE
        );
        let playlists: Vec<PlaylistObject> = self.collect_pages(url).await?;

        Ok(playlists
            .into_iter()
            .map(|p| SourcePlaylist {
                id: p.id,
                name: p.name,
                track_count: p.tracks.map(|t| t.total).unwrap_or_default(),
                snapshot_id: p.snapshot_id.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<SourceTrack>, CatalogError> {
        let url = format!(
            "{base}/playlists/{id}/tracks?limit={limit}",
            base = self.base_url,
            id = playlist_id,
            limit = PLAYLIST_TRACKS_PAGE_SIZE
        );
        let items: Vec<TrackItem> = self.collect_pages(url).await?;
        Ok(items.into_iter().filter_map(TrackItem::into_source_track).collect())
    }

    async fn list_saved_tracks(&self) -> Result<Vec<SourceTrack>, CatalogError> {
        let url = format!(
            "{base}/me/tracks?limit={limit}",
            base = self.base_url,
            limit = SAVED_TRACKS_PAGE_SIZE
        );
        let items: Vec<TrackItem> = self.collect_pages(url).await?;
        Ok(items.into_iter().filter_map(TrackItem::into_source_track).collect())
    }
}
