#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use navispot::{
    catalog::{DestinationCatalog, SourceCatalog},
    error::CatalogError,
    export::ExportDescriptor,
    types::{CandidateSong, DestinationPlaylist, SourcePlaylist, SourceTrack},
};

pub fn track(id: &str, title: &str, artist: &str, duration_ms: u64) -> SourceTrack {
    SourceTrack {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        album: String::new(),
        duration_ms,
        isrc: None,
    }
}

pub fn song(id: &str, title: &str, artist: &str, duration_seconds: f64) -> CandidateSong {
    CandidateSong {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: String::new(),
        duration_seconds,
        isrc: None,
    }
}

pub fn playlist(id: &str, name: &str, snapshot_id: &str, track_count: u32) -> SourcePlaylist {
    SourcePlaylist {
        id: id.to_string(),
        name: name.to_string(),
        track_count,
        snapshot_id: snapshot_id.to_string(),
    }
}

fn failure(what: &str) -> CatalogError {
    CatalogError::Api {
        status: 500,
        message: format!("{what} failed"),
    }
}

// =============================================================================
// Source catalog
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    pub playlists: Mutex<Vec<SourcePlaylist>>,
    pub tracks: Mutex<HashMap<String, Vec<SourceTrack>>>,
    pub saved: Mutex<Vec<SourceTrack>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a playlist together with its tracks.
    pub fn set_playlist(&self, playlist: SourcePlaylist, tracks: Vec<SourceTrack>) {
        let mut playlists = self.playlists.lock().unwrap();
        playlists.retain(|p| p.id != playlist.id);
        self.tracks
            .lock()
            .unwrap()
            .insert(playlist.id.clone(), tracks);
        playlists.push(playlist);
    }

    pub fn set_saved(&self, tracks: Vec<SourceTrack>) {
        *self.saved.lock().unwrap() = tracks;
    }
}

#[async_trait]
impl SourceCatalog for FakeSource {
    async fn list_playlists(&self) -> Result<Vec<SourcePlaylist>, CatalogError> {
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<SourceTrack>, CatalogError> {
        self.tracks
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))
    }

    async fn list_saved_tracks(&self) -> Result<Vec<SourceTrack>, CatalogError> {
        Ok(self.saved.lock().unwrap().clone())
    }
}

// =============================================================================
// Destination catalog
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakePlaylist {
    pub name: String,
    pub entries: Vec<String>,
    pub descriptor: Option<ExportDescriptor>,
}

/// In-memory destination that records every call it receives.
#[derive(Default)]
pub struct FakeDestination {
    pub songs: Mutex<Vec<CandidateSong>>,
    pub playlists: Mutex<BTreeMap<String, FakePlaylist>>,
    pub starred: Mutex<BTreeSet<String>>,

    /// Names passed to `find_candidates_by_artist`, in call order.
    pub artist_lookups: Mutex<Vec<String>>,
    /// Titles passed to `find_candidates_by_title`, in call order.
    pub title_lookups: Mutex<Vec<String>>,
    pub created: AtomicUsize,
    pub membership_updates: AtomicUsize,
    pub replacements: AtomicUsize,
    pub unstarred: Mutex<Vec<String>>,

    pub failing_artists: Mutex<HashSet<String>>,
    pub failing_stars: Mutex<HashSet<String>>,
    pub playlist_writes_fail: Mutex<bool>,
    pub descriptor_writes_fail: Mutex<bool>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_songs(songs: Vec<CandidateSong>) -> Self {
        let destination = Self::default();
        *destination.songs.lock().unwrap() = songs;
        destination
    }

    pub fn add_song(&self, song: CandidateSong) {
        self.songs.lock().unwrap().push(song);
    }

    pub fn insert_playlist(&self, id: &str, playlist: FakePlaylist) {
        self.playlists
            .lock()
            .unwrap()
            .insert(id.to_string(), playlist);
    }

    pub fn entries(&self, playlist_id: &str) -> Vec<String> {
        self.playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|p| p.entries.clone())
            .unwrap_or_default()
    }

    pub fn descriptor(&self, playlist_id: &str) -> Option<ExportDescriptor> {
        self.playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .and_then(|p| p.descriptor.clone())
    }

    pub fn lookups(&self) -> usize {
        self.artist_lookups.lock().unwrap().len() + self.title_lookups.lock().unwrap().len()
    }

    pub fn fail_artist(&self, name: &str) {
        self.failing_artists
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn fail_star(&self, song_id: &str) {
        self.failing_stars
            .lock()
            .unwrap()
            .insert(song_id.to_string());
    }

    pub fn fail_playlist_writes(&self) {
        *self.playlist_writes_fail.lock().unwrap() = true;
    }

    pub fn fail_descriptor_writes(&self) {
        *self.descriptor_writes_fail.lock().unwrap() = true;
    }

    fn check_writes(&self) -> Result<(), CatalogError> {
        if *self.playlist_writes_fail.lock().unwrap() {
            return Err(failure("playlist write"));
        }
        Ok(())
    }
}

#[async_trait]
impl DestinationCatalog for FakeDestination {
    async fn find_candidates_by_artist(
        &self,
        name: &str,
    ) -> Result<Vec<CandidateSong>, CatalogError> {
        self.artist_lookups.lock().unwrap().push(name.to_string());
        if self.failing_artists.lock().unwrap().contains(name) {
            return Err(failure("artist lookup"));
        }

        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.artist.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    async fn find_candidates_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<CandidateSong>, CatalogError> {
        self.title_lookups.lock().unwrap().push(title.to_string());
        let needle = title.to_lowercase();

        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_playlists(&self) -> Result<Vec<DestinationPlaylist>, CatalogError> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .iter()
            .map(|(id, p)| DestinationPlaylist {
                id: id.clone(),
                name: p.name.clone(),
                song_count: p.entries.len() as u32,
                descriptor: p.descriptor.clone(),
            })
            .collect())
    }

    async fn playlist_song_ids(&self, playlist_id: &str) -> Result<Vec<String>, CatalogError> {
        self.playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|p| p.entries.clone())
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))
    }

    async fn create_playlist(
        &self,
        name: &str,
        song_ids: &[String],
    ) -> Result<String, CatalogError> {
        self.check_writes()?;
        let number = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("nd-{number}");
        self.insert_playlist(
            &id,
            FakePlaylist {
                name: name.to_string(),
                entries: song_ids.to_vec(),
                descriptor: None,
            },
        );
        Ok(id)
    }

    async fn update_playlist_membership(
        &self,
        playlist_id: &str,
        add_ids: &[String],
        remove_positions: &[usize],
    ) -> Result<(), CatalogError> {
        self.check_writes()?;
        self.membership_updates.fetch_add(1, Ordering::SeqCst);

        let mut playlists = self.playlists.lock().unwrap();
        let playlist = playlists
            .get_mut(playlist_id)
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?;

        playlist.entries.extend(add_ids.iter().cloned());
        let remove: HashSet<usize> = remove_positions.iter().copied().collect();
        playlist.entries = playlist
            .entries
            .iter()
            .enumerate()
            .filter(|(position, _)| !remove.contains(position))
            .map(|(_, id)| id.clone())
            .collect();
        Ok(())
    }

    async fn replace_playlist_membership(
        &self,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), CatalogError> {
        self.check_writes()?;
        self.replacements.fetch_add(1, Ordering::SeqCst);

        let mut playlists = self.playlists.lock().unwrap();
        let playlist = playlists
            .get_mut(playlist_id)
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?;
        playlist.entries = song_ids.to_vec();
        Ok(())
    }

    async fn star_song(&self, song_id: &str) -> Result<(), CatalogError> {
        if self.failing_stars.lock().unwrap().contains(song_id) {
            return Err(failure("star"));
        }
        self.starred.lock().unwrap().insert(song_id.to_string());
        Ok(())
    }

    async fn unstar_song(&self, song_id: &str) -> Result<(), CatalogError> {
        self.unstarred.lock().unwrap().push(song_id.to_string());
        self.starred.lock().unwrap().remove(song_id);
        Ok(())
    }

    async fn read_playlist_descriptor(
        &self,
        playlist_id: &str,
    ) -> Result<Option<ExportDescriptor>, CatalogError> {
        Ok(self.descriptor(playlist_id))
    }

    async fn write_playlist_descriptor(
        &self,
        playlist_id: &str,
        descriptor: &ExportDescriptor,
    ) -> Result<(), CatalogError> {
        if *self.descriptor_writes_fail.lock().unwrap() {
            return Err(failure("descriptor write"));
        }

        let mut playlists = self.playlists.lock().unwrap();
        let playlist = playlists
            .get_mut(playlist_id)
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?;
        playlist.descriptor = Some(descriptor.clone());
        Ok(())
    }
}
