//! Capability interfaces consumed by the matching and export core.
//!
//! The core never talks HTTP itself. It is handed a [`SourceCatalog`] to read
//! playlists from and a [`DestinationCatalog`] to resolve candidates against
//! and to mutate. `spotify::SpotifyClient` and `navidrome::NavidromeClient`
//! are the production implementations; the integration tests use in-memory
//! fakes.

use async_trait::async_trait;

use crate::{
    error::CatalogError,
    export::descriptor::ExportDescriptor,
    types::{CandidateSong, DestinationPlaylist, SourcePlaylist, SourceTrack},
};

/// Read-only access to the catalog playlists are exported from.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, CatalogError>;

    /// All tracks of a playlist, in playlist order. Pagination is handled by
    /// the implementation.
    async fn list_playlist_tracks(&self, playlist_id: &str)
    -> Result<Vec<SourceTrack>, CatalogError>;

    async fn list_saved_tracks(&self) -> Result<Vec<SourceTrack>, CatalogError>;
}

/// Read/write access to the catalog songs are matched against.
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    async fn find_candidates_by_artist(&self, name: &str)
    -> Result<Vec<CandidateSong>, CatalogError>;

    async fn find_candidates_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<CandidateSong>, CatalogError>;

    async fn list_playlists(&self) -> Result<Vec<DestinationPlaylist>, CatalogError>;

    /// Song ids of a playlist's entries, in entry order. Entry positions used
    /// by [`DestinationCatalog::update_playlist_membership`] index into this.
    async fn playlist_song_ids(&self, playlist_id: &str) -> Result<Vec<String>, CatalogError>;

    /// Creates a playlist and returns its id.
    async fn create_playlist(&self, name: &str, song_ids: &[String])
    -> Result<String, CatalogError>;

    async fn update_playlist_membership(
        &self,
        playlist_id: &str,
        add_ids: &[String],
        remove_positions: &[usize],
    ) -> Result<(), CatalogError>;

    async fn replace_playlist_membership(
        &self,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), CatalogError>;

    async fn star_song(&self, song_id: &str) -> Result<(), CatalogError>;

    async fn unstar_song(&self, song_id: &str) -> Result<(), CatalogError>;

    async fn read_playlist_descriptor(
        &self,
        playlist_id: &str,
    ) -> Result<Option<ExportDescriptor>, CatalogError>;

    async fn write_playlist_descriptor(
        &self,
        playlist_id: &str,
        descriptor: &ExportDescriptor,
    ) -> Result<(), CatalogError>;
}
