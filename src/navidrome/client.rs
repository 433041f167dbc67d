use async_trait::async_trait;
use rand::{Rng, distr::Alphanumeric};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::{
    catalog::DestinationCatalog,
    config,
    error::{CatalogError, ConfigError},
    export::descriptor::{ExportDescriptor, embed_descriptor, parse_descriptor},
    types::{CandidateSong, DestinationPlaylist},
};

const SUBSONIC_API_VERSION: &str = "1.16.1";
const CLIENT_NAME: &str = "navispot";
const SONG_PAGE_SIZE: usize = 500;
const PLAYLIST_PAGE_SIZE: usize = 50;
const REMOVE_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    client_id: String,
}

/// Native API list responses are either a bare array or wrapped in `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IsrcField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeSong {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    isrc: Option<IsrcField>,
}

impl From<NativeSong> for CandidateSong {
    fn from(song: NativeSong) -> Self {
        let isrc = match song.isrc {
            Some(IsrcField::One(isrc)) => Some(isrc),
            Some(IsrcField::Many(all)) => all.into_iter().next(),
            None => None,
        }
        .filter(|isrc| !isrc.trim().is_empty());

        CandidateSong {
            id: song.id,
            title: song.title,
            artist: song.artist,
            album: song.album,
            duration_seconds: song.duration,
            isrc,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NativeArtist {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativePlaylist {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    song_count: u32,
    #[serde(default)]
    public: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistEntry {
    id: Value,
    media_file_id: Option<String>,
}

impl PlaylistEntry {
    fn song_id(self) -> String {
        match (self.media_file_id, self.id) {
            (Some(id), _) => id,
            (None, Value::String(id)) => id,
            (None, other) => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Navidrome client speaking the native REST API for catalog and playlist
/// access and the Subsonic API for stars.
pub struct NavidromeClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl NavidromeClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            session: Mutex::new(None),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            config::navidrome_url()?,
            config::navidrome_username()?,
            config::navidrome_password()?,
        ))
    }

    /// Logs in through `/auth/login` and keeps the session for later requests.
    pub async fn login(&self) -> Result<(), CatalogError> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Auth(format!(
                "login returned {}",
                response.status()
            )));
        }

        let body: Value = parse_body(response).await?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| CatalogError::Auth("login response without token".to_string()))?;

        *self.session.lock().await = Some(Session {
            token: token.to_string(),
            client_id: body["id"].as_str().unwrap_or_default().to_string(),
        });
        Ok(())
    }

    async fn session(&self) -> Result<Session, CatalogError> {
        if let Some(session) = self.session.lock().await.clone() {
            return Ok(session);
        }
        self.login().await?;
        self.session
            .lock()
            .await
            .clone()
            .ok_or_else(|| CatalogError::Auth("no session after login".to_string()))
    }

    /// Sends a native API request, logging in again once on 401.
    async fn native<F>(&self, method: Method, path: &str, build: F) -> Result<Response, CatalogError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;

        loop {
            let session = self.session().await?;
            let request = self
                .http
                .request(method.clone(), &url)
                .header("x-nd-authorization", format!("Bearer {}", session.token))
                .header("x-nd-client-unique-id", &session.client_id);
            let response = build(request).send().await?;

            match response.status() {
                StatusCode::UNAUTHORIZED if !retried => {
                    retried = true;
                    *self.session.lock().await = None;
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

    async fn get_listing<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(Vec<T>, Option<usize>), CatalogError> {
        let response = self
            .native(Method::GET, path, |req| req.query(query))
            .await?;
        let total = response
            .headers()
            .get("x-total-count")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let listing: Listing<T> = parse_body(response).await?;
        Ok((listing.into_vec(), total))
    }

    /// Pages through a listing until `x-total-count` is reached or a page
    /// comes back short, stopping early once `cap` items are collected.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, String)],
        page_size: usize,
        cap: usize,
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut start = 0;

        loop {
            let mut query = filters.to_vec();
            query.push(("_start", start.to_string()));
            query.push(("_end", (start + page_size).to_string()));

            let (page, total) = self.get_listing::<T>(path, &query).await?;
            let fetched = page.len();
            items.extend(page);

            let done = fetched < page_size
                || total.is_some_and(|total| items.len() >= total)
                || items.len() >= cap;
            if done {
                break;
            }
            start += page_size;
        }

        items.truncate(cap);
        Ok(items)
    }

    async fn find_artist_id(&self, name: &str) -> Result<Option<String>, CatalogError> {
        let query = [
            ("name", name.to_string()),
            ("_start", "0".to_string()),
            ("_end", "1".to_string()),
        ];
        let (artists, _) = self.get_listing::<NativeArtist>("/api/artist", &query).await?;
        Ok(artists.into_iter().next().map(|artist| artist.id))
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<NativePlaylist, CatalogError> {
        let response = self
            .native(Method::GET, &format!("/api/playlist/{playlist_id}"), |req| req)
            .await?;
        parse_body(response).await
    }

    async fn add_songs(&self, playlist_id: &str, song_ids: &[String]) -> Result<(), CatalogError> {
        if song_ids.is_empty() {
            return Ok(());
        }
        self.native(
            Method::POST,
            &format!("/api/playlist/{playlist_id}/tracks"),
            |req| req.json(&json!({ "ids": song_ids })),
        )
        .await?;
        Ok(())
    }

    /// Removes entries by zero-based position. The API numbers entries from 1.
    ///
    /// Positions are sent in chunks, highest first, so a removed chunk never
    /// shifts the entries of the chunks still to come.
    async fn remove_positions(
        &self,
        playlist_id: &str,
        positions: &[usize],
    ) -> Result<(), CatalogError> {
        let mut positions = positions.to_vec();
        positions.sort_unstable();
        positions.dedup();

        for chunk in positions.rchunks(REMOVE_CHUNK_SIZE) {
            let query: Vec<(&str, String)> = chunk
                .iter()
                .map(|position| ("id", (position + 1).to_string()))
                .collect();
            self.native(
                Method::DELETE,
                &format!("/api/playlist/{playlist_id}/tracks"),
                |req| req.query(&query),
            )
            .await?;
        }
        Ok(())
    }

    fn subsonic_auth(&self) -> Vec<(&'static str, String)> {
        let salt: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let token = format!("{:x}", md5::compute(format!("{}{}", self.password, salt)));

        vec![
            ("u", self.username.clone()),
            ("t", token),
            ("s", salt),
            ("v", SUBSONIC_API_VERSION.to_string()),
            ("c", CLIENT_NAME.to_string()),
            ("f", "json".to_string()),
        ]
    }

    async fn subsonic(&self, method: &str, song_id: &str) -> Result<(), CatalogError> {
        let mut query = self.subsonic_auth();
        query.push(("id", song_id.to_string()));

        let response = self
            .http
            .get(format!("{}/rest/{}", self.base_url, method))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CatalogError::Api {
                status: response.status().as_u16(),
                message: format!("{method} failed"),
            });
        }

        let body: Value = parse_body(response).await?;
        let reply = &body["subsonic-response"];
        if reply["status"].as_str() == Some("ok") {
            return Ok(());
        }

        Err(CatalogError::Api {
            status: reply["error"]["code"].as_u64().unwrap_or_default() as u16,
            message: reply["error"]["message"]
                .as_str()
                .unwrap_or("Subsonic request failed")
                .to_string(),
        })
    }
}

async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))
}

#[async_trait]
impl DestinationCatalog for NavidromeClient {
    async fn find_candidates_by_artist(
        &self,
        name: &str,
    ) -> Result<Vec<CandidateSong>, CatalogError> {
        let Some(artist_id) = self.find_artist_id(name).await? else {
            return Ok(Vec::new());
        };

        let songs: Vec<NativeSong> = self
            .get_all(
                "/api/song",
                &[("artist_id", artist_id)],
                SONG_PAGE_SIZE,
                usize::MAX,
            )
            .await?;
        Ok(songs.into_iter().map(CandidateSong::from).collect())
    }

    async fn find_candidates_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<CandidateSong>, CatalogError> {
        let songs: Vec<NativeSong> = self
            .get_all(
                "/api/song",
                &[("title", title.to_string())],
                limit.clamp(1, SONG_PAGE_SIZE),
                limit.max(1),
            )
            .await?;
        Ok(songs.into_iter().map(CandidateSong::from).collect())
    }

    async fn list_playlists(&self) -> Result<Vec<DestinationPlaylist>, CatalogError> {
        let playlists: Vec<NativePlaylist> = self
            .get_all(
                "/api/playlist",
                &[("_sort", "name".to_string()), ("_order", "ASC".to_string())],
                PLAYLIST_PAGE_SIZE,
                usize::MAX,
            )
            .await?;

        Ok(playlists
            .into_iter()
            .map(|p| DestinationPlaylist {
                descriptor: p.comment.as_deref().and_then(parse_descriptor),
                id: p.id,
                name: p.name,
                song_count: p.song_count,
            })
            .collect())
    }

    async fn playlist_song_ids(&self, playlist_id: &str) -> Result<Vec<String>, CatalogError> {
        let entries: Vec<PlaylistEntry> = self
            .get_all(
                &format!("/api/playlist/{playlist_id}/tracks"),
                &[],
                SONG_PAGE_SIZE,
                usize::MAX,
            )
            .await?;
        Ok(entries.into_iter().map(PlaylistEntry::song_id).collect())
    }

    async fn create_playlist(
        &self,
        name: &str,
        song_ids: &[String],
    ) -> Result<String, CatalogError> {
        let response = self
            .native(Method::POST, "/api/playlist", |req| {
                req.json(&json!({ "name": name }))
            })
            .await?;
        let created: Created = parse_body(response).await?;

        self.add_songs(&created.id, song_ids).await?;
        Ok(created.id)
    }

    async fn update_playlist_membership(
        &self,
        playlist_id: &str,
        add_ids: &[String],
        remove_positions: &[usize],
    ) -> Result<(), CatalogError> {
        self.add_songs(playlist_id, add_ids).await?;
        self.remove_positions(playlist_id, remove_positions).await
    }

    async fn replace_playlist_membership(
        &self,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), CatalogError> {
        let existing = self.playlist_song_ids(playlist_id).await?;
        let positions: Vec<usize> = (0..existing.len()).collect();
        self.update_playlist_membership(playlist_id, song_ids, &positions)
            .await
    }

    async fn star_song(&self, song_id: &str) -> Result<(), CatalogError> {
        self.subsonic("star", song_id).await
    }

    async fn unstar_song(&self, song_id: &str) -> Result<(), CatalogError> {
        self.subsonic("unstar", song_id).await
    }

    async fn read_playlist_descriptor(
        &self,
        playlist_id: &str,
    ) -> Result<Option<ExportDescriptor>, CatalogError> {
        let playlist = self.get_playlist(playlist_id).await?;
        Ok(playlist.comment.as_deref().and_then(parse_descriptor))
    }

    async fn write_playlist_descriptor(
        &self,
        playlist_id: &str,
        descriptor: &ExportDescriptor,
    ) -> Result<(), CatalogError> {
        let playlist = self.get_playlist(playlist_id).await?;
        let comment = embed_descriptor(playlist.comment.as_deref(), descriptor)
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        self.native(
            Method::PUT,
            &format!("/api/playlist/{playlist_id}"),
            |req| {
                req.json(&json!({
                    "name": playlist.name,
                    "comment": comment,
                    "public": playlist.public,
                }))
            },
        )
        .await?;
        Ok(())
    }
}
