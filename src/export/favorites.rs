//! Favorites exporter: stars matched songs instead of filling a playlist.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use crate::{
    catalog::DestinationCatalog,
    error::Result,
    export::{
        cache::PlaylistExportRecord,
        playlist::{ExportErrorEntry, ExportPhase, ExportProgress, check},
    },
    types::{MatchStatus, TrackMatch},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FavoritesStatistics {
    pub total: usize,
    pub starred: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct FavoritesExportResult {
    pub statistics: FavoritesStatistics,
    pub errors: Vec<ExportErrorEntry>,
    pub duration: Duration,
}

pub struct FavoritesExporter<D: ?Sized> {
    destination: Arc<D>,
}

impl<D: DestinationCatalog + ?Sized> FavoritesExporter<D> {
    pub fn new(destination: Arc<D>) -> Self {
        Self { destination }
    }

    /// Stars every matched song. A failed star is recorded and the rest
    /// carry on.
    pub async fn export<F>(
        &self,
        matches: &[TrackMatch],
        skip_unmatched: bool,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<FavoritesExportResult>
    where
        F: FnMut(ExportProgress),
    {
        let started = Instant::now();
        progress(ExportProgress::new(
            ExportPhase::Preparing,
            format!("Preparing to star {} tracks", matches.len()),
        ));

        let mut stats = FavoritesStatistics {
            total: matches.len(),
            ..FavoritesStatistics::default()
        };
        let mut errors = Vec::new();

        for (index, m) in matches.iter().enumerate() {
            let song_id = match m.destination_song_id().filter(|_| m.is_exportable()) {
                Some(id) => id,
                None if skip_unmatched => {
                    stats.skipped += 1;
                    continue;
                }
                None => {
                    stats.failed += 1;
                    let reason = if m.status == MatchStatus::Ambiguous {
                        "Ambiguous match"
                    } else {
                        "No matching song found"
                    };
                    errors.push(ExportErrorEntry::for_match(m, reason));
                    continue;
                }
            };

            check(cancel)?;
            match self.destination.star_song(song_id).await {
                Ok(()) => stats.starred += 1,
                Err(err) => {
                    tracing::warn!(song_id, title = %m.source_track.title, error = %err, "failed to star song");
                    stats.failed += 1;
                    errors.push(ExportErrorEntry::for_match(m, err.to_string()));
                }
            }

            progress(ExportProgress::new(
                ExportPhase::StarringTracks,
                format!("Starred {} of {}", index + 1, matches.len()),
            ));
        }

        let phase = if stats.failed > 0 && stats.starred == 0 && stats.total > stats.skipped {
            ExportPhase::Failed
        } else {
            ExportPhase::Completed
        };
        progress(ExportProgress::new(
            phase,
            format!("Starred {} of {} tracks", stats.starred, stats.total),
        ));

        Ok(FavoritesExportResult {
            statistics: stats,
            errors,
            duration: started.elapsed(),
        })
    }

    /// Unstars songs whose liked track disappeared since `previous` was
    /// recorded, unless a current match still points at the same song.
    /// Pending outcomes were never starred and are left alone. Failures are
    /// logged and skipped. Returns how many songs were unstarred.
    pub async fn unstar_removed<F>(
        &self,
        previous: &PlaylistExportRecord,
        current: &[TrackMatch],
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<usize>
    where
        F: FnMut(ExportProgress),
    {
        let current_ids: HashSet<&str> = current
            .iter()
            .map(|m| m.source_track.id.as_str())
            .collect();
        let still_liked: HashSet<&str> = current
            .iter()
            .filter(|m| m.is_exportable())
            .filter_map(|m| m.destination_song_id())
            .collect();

        let mut unstarred = 0;
        for status in previous
            .tracks
            .values()
            .filter(|status| {
                !status.pending && !current_ids.contains(status.source_track_id.as_str())
            })
        {
            let Some(song_id) = status.destination_song_id.as_deref() else {
                continue;
            };
            if still_liked.contains(song_id) {
                continue;
            }

            check(cancel)?;
            match self.destination.unstar_song(song_id).await {
                Ok(()) => unstarred += 1,
                Err(err) => tracing::warn!(song_id, error = %err, "failed to unstar song"),
            }
        }

        progress(ExportProgress::new(
            ExportPhase::UnstarringTracks,
            format!("Unstarred {} songs", unstarred),
        ));
        Ok(unstarred)
    }
}
