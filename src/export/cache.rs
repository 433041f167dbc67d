//! Persisted per-playlist export records and the store interface behind them.
//!
//! A [`PlaylistExportRecord`] remembers, for every source track of a playlist,
//! what it resolved to the last time the playlist was exported. The record's
//! snapshot id is the change-detection key: an unchanged snapshot means the
//! playlist does not need to be matched again.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    error::CacheError,
    types::{MatchStatus, MatchStrategy, SourceTrack, TrackMatch},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackExportStatus {
    pub source_track_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_song_id: Option<String>,
    pub status: MatchStatus,
    pub match_strategy: MatchStrategy,
    pub match_score: f64,
    pub matched_at: DateTime<Utc>,
    /// Matched by an interrupted run but not yet written to the destination.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl TrackExportStatus {
    /// Only confident matches keep their destination song id; that id is
    /// what stale playlist entries are later located by.
    pub fn from_match(m: &TrackMatch, matched_at: DateTime<Utc>) -> Self {
        let destination_song_id = if m.status == MatchStatus::Matched {
            m.destination_song_id().map(str::to_string)
        } else {
            None
        };

        Self {
            source_track_id: m.source_track.id.clone(),
            destination_song_id,
            status: m.status,
            match_strategy: m.match_strategy,
            match_score: m.match_score,
            matched_at,
            pending: false,
        }
    }

    fn into_pending(mut self) -> Self {
        self.pending = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatistics {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
}

impl RecordStatistics {
    pub fn from_tracks(tracks: &BTreeMap<String, TrackExportStatus>) -> Self {
        let mut stats = Self {
            total: tracks.len(),
            ..Self::default()
        };
        for status in tracks.values() {
            match status.status {
                MatchStatus::Matched => stats.matched += 1,
                MatchStatus::Ambiguous => stats.ambiguous += 1,
                MatchStatus::Unmatched => stats.unmatched += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistExportRecord {
    pub source_playlist_id: String,
    pub source_snapshot_id: String,
    pub playlist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_playlist_id: Option<String>,
    pub exported_at: DateTime<Utc>,
    pub track_count: usize,
    pub tracks: BTreeMap<String, TrackExportStatus>,
    pub statistics: RecordStatistics,
}

impl PlaylistExportRecord {
    pub fn is_up_to_date(&self, current_snapshot_id: &str) -> bool {
        is_playlist_up_to_date(self, current_snapshot_id)
    }

    /// True when some outcome was matched but never written.
    pub fn has_pending(&self) -> bool {
        self.tracks.values().any(|status| status.pending)
    }

    /// True when the track's outcome was written by a finished export.
    pub fn is_exported(&self, source_track_id: &str) -> bool {
        self.tracks
            .get(source_track_id)
            .is_some_and(|status| !status.pending)
    }

    /// Cached entries for tracks that are no longer in `tracks`.
    pub fn stale_entries<'a>(&'a self, tracks: &[SourceTrack]) -> Vec<&'a TrackExportStatus> {
        let current: HashSet<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        self.tracks
            .values()
            .filter(|status| !current.contains(status.source_track_id.as_str()))
            .collect()
    }
}

/// True iff the snapshot ids are exactly equal.
pub fn is_playlist_up_to_date(record: &PlaylistExportRecord, current_snapshot_id: &str) -> bool {
    record.source_snapshot_id == current_snapshot_id
}

/// Identity of the playlist a record is written for.
#[derive(Debug, Clone)]
pub struct RecordTarget<'a> {
    pub source_playlist_id: &'a str,
    pub source_snapshot_id: &'a str,
    pub playlist_name: &'a str,
    pub destination_playlist_id: Option<String>,
}

/// Builds the record of a finished export.
///
/// Entries of `previous` survive for tracks still in `tracks`; `new_matches`
/// are added on top and win over carried entries. Entries for tracks that
/// left the playlist are dropped. Every surviving entry counts as written.
/// Statistics are recomputed from the result.
pub fn build_export_record(
    previous: Option<&PlaylistExportRecord>,
    target: RecordTarget<'_>,
    tracks: &[SourceTrack],
    new_matches: &[TrackMatch],
    exported_at: DateTime<Utc>,
) -> PlaylistExportRecord {
    let current: HashSet<&str> = tracks.iter().map(|t| t.id.as_str()).collect();

    let mut entries: BTreeMap<String, TrackExportStatus> = previous
        .map(|record| {
            record
                .tracks
                .iter()
                .filter(|(id, _)| current.contains(id.as_str()))
                .map(|(id, status)| {
                    let mut status = status.clone();
                    status.pending = false;
                    (id.clone(), status)
                })
                .collect()
        })
        .unwrap_or_default();

    for m in new_matches
        .iter()
        .filter(|m| current.contains(m.source_track.id.as_str()))
    {
        entries.insert(
            m.source_track.id.clone(),
            TrackExportStatus::from_match(m, exported_at),
        );
    }

    assemble(target, tracks.len(), entries, exported_at)
}

/// Builds the record of an interrupted export.
///
/// Nothing is dropped: every previous entry is kept so that tracks removed
/// from the source are still known on the next run. The new matches are
/// added on top as pending, so the retry reuses them without matching again
/// but still writes them. A new match that resolves to the song a finished
/// export already wrote stays written. The caller passes the previous
/// snapshot id in `target`.
pub fn build_partial_record(
    previous: Option<&PlaylistExportRecord>,
    target: RecordTarget<'_>,
    track_count: usize,
    new_matches: &[TrackMatch],
    exported_at: DateTime<Utc>,
) -> PlaylistExportRecord {
    let mut entries = previous
        .map(|record| record.tracks.clone())
        .unwrap_or_default();

    for m in new_matches {
        let status = TrackExportStatus::from_match(m, exported_at);
        let written = previous
            .and_then(|record| record.tracks.get(&status.source_track_id))
            .is_some_and(|prev| {
                !prev.pending && prev.destination_song_id == status.destination_song_id
            });
        let status = if written { status } else { status.into_pending() };
        entries.insert(m.source_track.id.clone(), status);
    }

    assemble(target, track_count, entries, exported_at)
}

fn assemble(
    target: RecordTarget<'_>,
    track_count: usize,
    tracks: BTreeMap<String, TrackExportStatus>,
    exported_at: DateTime<Utc>,
) -> PlaylistExportRecord {
    PlaylistExportRecord {
        source_playlist_id: target.source_playlist_id.to_string(),
        source_snapshot_id: target.source_snapshot_id.to_string(),
        playlist_name: target.playlist_name.to_string(),
        destination_playlist_id: target.destination_playlist_id,
        exported_at,
        track_count,
        statistics: RecordStatistics::from_tracks(&tracks),
        tracks,
    }
}

/// Key-value store of export records, keyed by source playlist id.
#[async_trait]
pub trait ExportCacheStore: Send + Sync {
    async fn get(&self, source_playlist_id: &str)
    -> Result<Option<PlaylistExportRecord>, CacheError>;

    /// Stores `record`, replacing any record with the same source playlist id.
    async fn set(&self, record: &PlaylistExportRecord) -> Result<(), CacheError>;

    async fn list_all(&self) -> Result<Vec<PlaylistExportRecord>, CacheError>;

    /// Returns whether a record was removed.
    async fn remove(&self, source_playlist_id: &str) -> Result<bool, CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryExportCache {
    records: Mutex<BTreeMap<String, PlaylistExportRecord>>,
}

impl MemoryExportCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExportCacheStore for MemoryExportCache {
    async fn get(
        &self,
        source_playlist_id: &str,
    ) -> Result<Option<PlaylistExportRecord>, CacheError> {
        Ok(self.records.lock().await.get(source_playlist_id).cloned())
    }

    async fn set(&self, record: &PlaylistExportRecord) -> Result<(), CacheError> {
        self.records
            .lock()
            .await
            .insert(record.source_playlist_id.clone(), record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PlaylistExportRecord>, CacheError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn remove(&self, source_playlist_id: &str) -> Result<bool, CacheError> {
        Ok(self
            .records
            .lock()
            .await
            .remove(source_playlist_id)
            .is_some())
    }
}
