//! End-to-end export of one playlist, or of the liked songs.
//!
//! The pipeline reads the previous export record, decides between skipping,
//! differential and full matching, runs the matching exporter and writes the
//! new record back. A cancelled run still persists what it matched, as
//! pending outcomes under the previous snapshot id, before reporting
//! [`ExportError::Cancelled`]. The retry reuses those outcomes and writes them.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::{DestinationCatalog, SourceCatalog},
    error::{ExportError, Result},
    export::{
        cache::{
            ExportCacheStore, PlaylistExportRecord, RecordTarget, build_export_record,
            build_partial_record,
        },
        descriptor::{ExportDescriptor, find_exported_playlist},
        favorites::{FavoritesExportResult, FavoritesExporter, FavoritesStatistics},
        playlist::{ExportMode, ExportProgress, PlaylistExportRequest, PlaylistExportResult, PlaylistExporter},
    },
    matching::{BatchMatcher, BatchProgress, MatchingOptions, TrackMatcher, carried_match},
    types::{LIKED_SONGS_ID, MatchStatistics, SourcePlaylist, SourceTrack, TrackMatch},
};

pub const LIKED_SONGS_NAME: &str = "Liked Songs";

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Explicit mode. `None` picks update, overwrite or create from the
    /// cache and the destination descriptors.
    pub mode: Option<ExportMode>,
    /// Destination playlist for an explicit append or overwrite.
    pub target_playlist_id: Option<String>,
    /// Re-match every track even when the cache is up to date.
    pub force: bool,
    pub skip_unmatched: bool,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    FetchingTracks { playlist: String },
    TracksFetched { count: usize },
    UpToDate,
    Matching(BatchProgress),
    Exporting(ExportProgress),
    Persisted { tracks: usize },
}

#[derive(Debug, Clone)]
pub struct PlaylistExportOutcome {
    pub matches: Vec<TrackMatch>,
    pub statistics: MatchStatistics,
    pub export: PlaylistExportResult,
    pub up_to_date: bool,
    /// The destination playlist was found through its descriptor.
    pub cross_referenced: bool,
    pub record: PlaylistExportRecord,
}

#[derive(Debug, Clone)]
pub struct LikedSongsOutcome {
    pub matches: Vec<TrackMatch>,
    pub statistics: MatchStatistics,
    pub export: FavoritesExportResult,
    pub unstarred: usize,
    pub up_to_date: bool,
    pub record: PlaylistExportRecord,
}

/// Snapshot id for the liked songs, which have none of their own.
pub fn liked_snapshot_id(tracks: &[SourceTrack]) -> String {
    format!(
        "{}:{}",
        tracks.len(),
        tracks.first().map(|t| t.id.as_str()).unwrap_or_default()
    )
}

struct Destination {
    mode: ExportMode,
    playlist_id: Option<String>,
    cross_referenced: bool,
}

pub struct ExportPipeline<S: ?Sized, D: ?Sized, C: ?Sized> {
    source: Arc<S>,
    destination: Arc<D>,
    cache: Arc<C>,
    batch: BatchMatcher<D>,
    playlists: PlaylistExporter<D>,
    favorites: FavoritesExporter<D>,
}

impl<S, D, C> ExportPipeline<S, D, C>
where
    S: SourceCatalog + ?Sized,
    D: DestinationCatalog + ?Sized + 'static,
    C: ExportCacheStore + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        destination: Arc<D>,
        cache: Arc<C>,
        options: MatchingOptions,
        concurrency: usize,
    ) -> Self {
        let matcher = TrackMatcher::new(Arc::clone(&destination), options);
        Self {
            batch: BatchMatcher::new(matcher, concurrency),
            playlists: PlaylistExporter::new(Arc::clone(&destination)),
            favorites: FavoritesExporter::new(Arc::clone(&destination)),
            source,
            destination,
            cache,
        }
    }

    pub async fn export_playlist<F>(
        &self,
        playlist: &SourcePlaylist,
        options: &ExportOptions,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<PlaylistExportOutcome>
    where
        F: FnMut(PipelineEvent),
    {
        let previous = self.cache.get(&playlist.id).await?;
        let target = self
            .resolve_destination(playlist, previous.as_ref(), options)
            .await;

        on_event(PipelineEvent::FetchingTracks {
            playlist: playlist.name.clone(),
        });
        let tracks = self.source.list_playlist_tracks(&playlist.id).await?;
        on_event(PipelineEvent::TracksFetched {
            count: tracks.len(),
        });

        let up_to_date = target.mode == ExportMode::Update
            && !options.force
            && previous
                .as_ref()
                .is_some_and(|record| {
                    record.is_up_to_date(&playlist.snapshot_id) && !record.has_pending()
                });

        let (matches, new_matches) = if up_to_date {
            on_event(PipelineEvent::UpToDate);
            (carried_matches(&tracks, previous.as_ref()), Vec::new())
        } else {
            let reuse = if options.force { None } else { previous.as_ref() };
            self.match_tracks(
                &playlist.id,
                &playlist.name,
                &tracks,
                previous.as_ref(),
                reuse,
                cancel,
                &mut on_event,
            )
            .await?
        };

        let now = Utc::now();
        let descriptor = ExportDescriptor {
            source_playlist_id: playlist.id.clone(),
            destination_playlist_id: target.playlist_id.clone(),
            source_snapshot_id: playlist.snapshot_id.clone(),
            exported_at: now,
            track_count: tracks.len(),
        };
        let request = PlaylistExportRequest {
            playlist_name: &playlist.name,
            mode: target.mode,
            existing_playlist_id: target.playlist_id.as_deref(),
            previous: previous.as_ref(),
            skip_unmatched: options.skip_unmatched,
            descriptor: Some(descriptor),
        };

        let exported = self
            .playlists
            .export(&matches, request, cancel, |p| {
                on_event(PipelineEvent::Exporting(p))
            })
            .await;

        let export = match exported {
            Ok(export) => export,
            Err(err) => {
                if err.is_cancelled() {
                    self.persist_partial(
                        &playlist.id,
                        &playlist.name,
                        tracks.len(),
                        previous.as_ref(),
                        &new_matches,
                    )
                    .await;
                }
                return Err(err);
            }
        };

        let record = if export.success {
            build_export_record(
                previous.as_ref(),
                RecordTarget {
                    source_playlist_id: &playlist.id,
                    source_snapshot_id: &playlist.snapshot_id,
                    playlist_name: &playlist.name,
                    destination_playlist_id: export.playlist_id.clone(),
                },
                &tracks,
                &new_matches,
                now,
            )
        } else {
            build_partial_record(
                previous.as_ref(),
                partial_target(&playlist.id, &playlist.name, previous.as_ref()),
                tracks.len(),
                &new_matches,
                now,
            )
        };

        self.cache.set(&record).await?;
        on_event(PipelineEvent::Persisted {
            tracks: record.tracks.len(),
        });

        Ok(PlaylistExportOutcome {
            statistics: MatchStatistics::from_matches(&matches),
            matches,
            export,
            up_to_date,
            cross_referenced: target.cross_referenced,
            record,
        })
    }

    pub async fn export_liked_songs<F>(
        &self,
        options: &ExportOptions,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<LikedSongsOutcome>
    where
        F: FnMut(PipelineEvent),
    {
        on_event(PipelineEvent::FetchingTracks {
            playlist: LIKED_SONGS_NAME.to_string(),
        });
        let tracks = self.source.list_saved_tracks().await?;
        on_event(PipelineEvent::TracksFetched {
            count: tracks.len(),
        });

        let snapshot = liked_snapshot_id(&tracks);
        let previous = self.cache.get(LIKED_SONGS_ID).await?;
        let now = Utc::now();

        if !options.force
            && previous
                .as_ref()
                .is_some_and(|record| record.is_up_to_date(&snapshot) && !record.has_pending())
        {
            on_event(PipelineEvent::UpToDate);
            let matches = carried_matches(&tracks, previous.as_ref());
            let record = build_export_record(
                previous.as_ref(),
                liked_target(&snapshot),
                &tracks,
                &[],
                now,
            );
            return Ok(LikedSongsOutcome {
                statistics: MatchStatistics::from_matches(&matches),
                matches,
                export: FavoritesExportResult {
                    statistics: FavoritesStatistics::default(),
                    errors: Vec::new(),
                    duration: std::time::Duration::ZERO,
                },
                unstarred: 0,
                up_to_date: true,
                record,
            });
        }

        let reuse = if options.force { None } else { previous.as_ref() };
        let (matches, new_matches) = self
            .match_tracks(
                LIKED_SONGS_ID,
                LIKED_SONGS_NAME,
                &tracks,
                previous.as_ref(),
                reuse,
                cancel,
                &mut on_event,
            )
            .await?;

        // Carried outcomes left pending by an interrupted run are starred too.
        let to_star: Vec<TrackMatch> = match reuse {
            Some(record) => matches
                .iter()
                .filter(|m| !record.is_exported(&m.source_track.id))
                .cloned()
                .collect(),
            None => new_matches.clone(),
        };

        let starred = async {
            let export = self
                .favorites
                .export(&to_star, options.skip_unmatched, cancel, |p| {
                    on_event(PipelineEvent::Exporting(p))
                })
                .await?;
            let unstarred = match previous.as_ref() {
                Some(record) => {
                    self.favorites
                        .unstar_removed(record, &matches, cancel, |p| {
                            on_event(PipelineEvent::Exporting(p))
                        })
                        .await?
                }
                None => 0,
            };
            Ok::<_, ExportError>((export, unstarred))
        }
        .await;

        let (export, unstarred) = match starred {
            Ok(done) => done,
            Err(err) => {
                if err.is_cancelled() {
                    self.persist_partial(
                        LIKED_SONGS_ID,
                        LIKED_SONGS_NAME,
                        tracks.len(),
                        previous.as_ref(),
                        &new_matches,
                    )
                    .await;
                }
                return Err(err);
            }
        };

        let record = build_export_record(
            previous.as_ref(),
            liked_target(&snapshot),
            &tracks,
            &new_matches,
            now,
        );
        self.cache.set(&record).await?;
        on_event(PipelineEvent::Persisted {
            tracks: record.tracks.len(),
        });

        Ok(LikedSongsOutcome {
            statistics: MatchStatistics::from_matches(&matches),
            matches,
            export,
            unstarred,
            up_to_date: false,
            record,
        })
    }

    /// Picks the export mode and destination playlist.
    async fn resolve_destination(
        &self,
        playlist: &SourcePlaylist,
        previous: Option<&PlaylistExportRecord>,
        options: &ExportOptions,
    ) -> Destination {
        if let Some(mode) = options.mode {
            return Destination {
                mode,
                playlist_id: options.target_playlist_id.clone(),
                cross_referenced: false,
            };
        }

        if let Some(playlist_id) = previous.and_then(|r| r.destination_playlist_id.clone()) {
            let mode = if options.force {
                ExportMode::Overwrite
            } else {
                ExportMode::Update
            };
            return Destination {
                mode,
                playlist_id: Some(playlist_id),
                cross_referenced: false,
            };
        }

        match self.destination.list_playlists().await {
            Ok(existing) => {
                if let Some(found) = find_exported_playlist(&existing, &playlist.id) {
                    tracing::debug!(
                        playlist = %playlist.name,
                        destination = %found.id,
                        "found previous export through its descriptor"
                    );
                    return Destination {
                        mode: ExportMode::Overwrite,
                        playlist_id: Some(found.id.clone()),
                        cross_referenced: true,
                    };
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot list destination playlists, creating a new one");
            }
        }

        Destination {
            mode: ExportMode::Create,
            playlist_id: None,
            cross_referenced: false,
        }
    }

    /// Returns all matches in track order plus the freshly computed ones.
    /// `reuse` is the record whose outcomes may be carried over.
    #[allow(clippy::too_many_arguments)]
    async fn match_tracks<F>(
        &self,
        source_playlist_id: &str,
        playlist_name: &str,
        tracks: &[SourceTrack],
        previous: Option<&PlaylistExportRecord>,
        reuse: Option<&PlaylistExportRecord>,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Result<(Vec<TrackMatch>, Vec<TrackMatch>)>
    where
        F: FnMut(PipelineEvent),
    {
        let mut new_matches = Vec::new();

        let matched = match reuse {
            Some(record) => self
                .batch
                .match_differential(tracks, &record.tracks, &mut new_matches, cancel, |p| {
                    on_event(PipelineEvent::Matching(p))
                })
                .await
                .map(|result| result.matches),
            None => self
                .batch
                .match_into(tracks, &mut new_matches, cancel, |p| {
                    on_event(PipelineEvent::Matching(p))
                })
                .await
                .map(|_| new_matches.clone()),
        };

        match matched {
            Ok(matches) => Ok((matches, new_matches)),
            Err(err) => {
                if err.is_cancelled() {
                    self.persist_partial(
                        source_playlist_id,
                        playlist_name,
                        tracks.len(),
                        previous,
                        &new_matches,
                    )
                    .await;
                }
                Err(err)
            }
        }
    }

    /// Stores what was matched so far under the previous snapshot id, so a
    /// retry resumes instead of treating the playlist as up to date.
    async fn persist_partial(
        &self,
        source_playlist_id: &str,
        playlist_name: &str,
        track_count: usize,
        previous: Option<&PlaylistExportRecord>,
        new_matches: &[TrackMatch],
    ) {
        if new_matches.is_empty() {
            return;
        }

        let record = build_partial_record(
            previous,
            partial_target(source_playlist_id, playlist_name, previous),
            track_count,
            new_matches,
            Utc::now(),
        );

        match self.cache.set(&record).await {
            Ok(()) => tracing::debug!(
                playlist = %playlist_name,
                tracks = record.tracks.len(),
                "persisted partial export"
            ),
            Err(err) => tracing::warn!(
                playlist = %playlist_name,
                error = %err,
                "failed to persist partial export"
            ),
        }
    }
}

fn carried_matches(
    tracks: &[SourceTrack],
    previous: Option<&PlaylistExportRecord>,
) -> Vec<TrackMatch> {
    let Some(record) = previous else {
        return Vec::new();
    };
    tracks
        .iter()
        .filter_map(|track| {
            record
                .tracks
                .get(&track.id)
                .map(|status| carried_match(track, status))
        })
        .collect()
}

fn partial_target<'a>(
    source_playlist_id: &'a str,
    playlist_name: &'a str,
    previous: Option<&'a PlaylistExportRecord>,
) -> RecordTarget<'a> {
    RecordTarget {
        source_playlist_id,
        source_snapshot_id: previous
            .map(|r| r.source_snapshot_id.as_str())
            .unwrap_or_default(),
        playlist_name,
        destination_playlist_id: previous.and_then(|r| r.destination_playlist_id.clone()),
    }
}

fn liked_target(snapshot: &str) -> RecordTarget<'_> {
    RecordTarget {
        source_playlist_id: LIKED_SONGS_ID,
        source_snapshot_id: snapshot,
        playlist_name: LIKED_SONGS_NAME,
        destination_playlist_id: None,
    }
}
