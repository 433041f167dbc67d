//! Playlist exporter.
//!
//! Every mode is first turned into an [`ExportPlan`] by [`plan_export`], a
//! pure function that validates preconditions and settles the statistics.
//! [`PlaylistExporter::export`] then carries the plan out against the
//! destination catalog.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use crate::{
    catalog::DestinationCatalog,
    error::{ExportError, Result},
    export::{cache::PlaylistExportRecord, descriptor::ExportDescriptor},
    types::{MatchStatus, TrackMatch},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportMode {
    #[default]
    Create,
    Append,
    Overwrite,
    Update,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportMode::Create => "create",
            ExportMode::Append => "append",
            ExportMode::Overwrite => "overwrite",
            ExportMode::Update => "update",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStatistics {
    pub total: usize,
    pub exported: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A track that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportErrorEntry {
    pub track_name: String,
    pub artist_name: String,
    pub reason: String,
}

impl ExportErrorEntry {
    pub fn for_match(m: &TrackMatch, reason: impl Into<String>) -> Self {
        Self {
            track_name: m.source_track.title.clone(),
            artist_name: m.source_track.display_artists(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Preparing,
    AddingTracks,
    RemovingTracks,
    UpdatingDescriptor,
    StarringTracks,
    UnstarringTracks,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProgress {
    pub phase: ExportPhase,
    pub message: String,
}

impl ExportProgress {
    pub(crate) fn new(phase: ExportPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistExportRequest<'a> {
    pub playlist_name: &'a str,
    pub mode: ExportMode,
    /// Required by append, overwrite and update.
    pub existing_playlist_id: Option<&'a str>,
    /// Previous export of the playlist. Required by update.
    pub previous: Option<&'a PlaylistExportRecord>,
    pub skip_unmatched: bool,
    /// Written to the destination playlist after the membership change.
    pub descriptor: Option<ExportDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanAction {
    Create {
        name: String,
        song_ids: Vec<String>,
    },
    Append {
        playlist_id: String,
        song_ids: Vec<String>,
    },
    Overwrite {
        playlist_id: String,
        song_ids: Vec<String>,
    },
    Update {
        playlist_id: String,
        add_ids: Vec<String>,
        /// Cached destination song ids of tracks that left the source.
        stale_song_ids: Vec<String>,
        /// Destination song ids of every exportable current track.
        keep_song_ids: Vec<String>,
        /// Ids in `add_ids` that an interrupted run may already have written.
        pending_song_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub action: PlanAction,
    pub statistics: ExportStatistics,
    pub errors: Vec<ExportErrorEntry>,
}

#[derive(Debug, Clone)]
pub struct PlaylistExportResult {
    pub success: bool,
    pub mode: ExportMode,
    pub playlist_id: Option<String>,
    pub statistics: ExportStatistics,
    /// Destination entries removed in update mode.
    pub removed: usize,
    pub errors: Vec<ExportErrorEntry>,
    pub duration: Duration,
}

/// Splits `matches` into exportable song ids and accounting for the rest.
fn tally(
    matches: &[&TrackMatch],
    skip_unmatched: bool,
) -> (Vec<String>, ExportStatistics, Vec<ExportErrorEntry>) {
    let mut song_ids = Vec::new();
    let mut errors = Vec::new();
    let mut stats = ExportStatistics {
        total: matches.len(),
        ..ExportStatistics::default()
    };

    for m in matches {
        match m.destination_song_id().filter(|_| m.is_exportable()) {
            Some(id) => {
                song_ids.push(id.to_string());
                stats.exported += 1;
            }
            None if skip_unmatched => stats.skipped += 1,
            None => {
                stats.failed += 1;
                let reason = match m.status {
                    MatchStatus::Ambiguous => "Ambiguous match",
                    _ => "No matching song found",
                };
                errors.push(ExportErrorEntry::for_match(m, reason));
            }
        }
    }

    (song_ids, stats, errors)
}

fn required_playlist_id(request: &PlaylistExportRequest<'_>) -> Result<String> {
    request
        .existing_playlist_id
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(ExportError::MissingPlaylistId { mode: request.mode })
}

/// Validates the request and decides what the export will do.
pub fn plan_export(matches: &[TrackMatch], request: &PlaylistExportRequest<'_>) -> Result<ExportPlan> {
    let all: Vec<&TrackMatch> = matches.iter().collect();

    if request.mode != ExportMode::Update {
        let (song_ids, statistics, errors) = tally(&all, request.skip_unmatched);
        let action = match request.mode {
            ExportMode::Append => PlanAction::Append {
                playlist_id: required_playlist_id(request)?,
                song_ids,
            },
            ExportMode::Overwrite => PlanAction::Overwrite {
                playlist_id: required_playlist_id(request)?,
                song_ids,
            },
            _ => PlanAction::Create {
                name: request.playlist_name.to_string(),
                song_ids,
            },
        };
        return Ok(ExportPlan {
            action,
            statistics,
            errors,
        });
    }

    let playlist_id = required_playlist_id(request)?;
    let previous = request.previous.ok_or(ExportError::MissingCachedRecord)?;

    let current: HashSet<&str> = matches
        .iter()
        .map(|m| m.source_track.id.as_str())
        .collect();
    // Pending outcomes were never written, so they are added like new tracks.
    let delta: Vec<&TrackMatch> = all
        .into_iter()
        .filter(|m| !previous.is_exported(&m.source_track.id))
        .collect();
    let stale_song_ids = previous
        .tracks
        .values()
        .filter(|status| {
            !status.pending && !current.contains(status.source_track_id.as_str())
        })
        .filter_map(|status| status.destination_song_id.clone())
        .collect();
    let keep_song_ids = matches
        .iter()
        .filter(|m| m.is_exportable())
        .filter_map(|m| m.destination_song_id().map(str::to_string))
        .collect();

    let pending_song_ids = delta
        .iter()
        .filter(|m| m.is_exportable())
        .filter(|m| previous.tracks.contains_key(&m.source_track.id))
        .filter_map(|m| m.destination_song_id().map(str::to_string))
        .collect();

    let (add_ids, statistics, errors) = tally(&delta, request.skip_unmatched);
    Ok(ExportPlan {
        action: PlanAction::Update {
            playlist_id,
            add_ids,
            stale_song_ids,
            keep_song_ids,
            pending_song_ids,
        },
        statistics,
        errors,
    })
}

/// Entry positions to remove for `stale_song_ids`, given the playlist's
/// current entries. An entry is only removed when no current track still
/// needs that song.
pub fn stale_positions(
    entries: &[String],
    stale_song_ids: &[String],
    keep_song_ids: &[String],
) -> Vec<usize> {
    let mut surplus: HashMap<&str, usize> = HashMap::new();
    for id in entries {
        *surplus.entry(id.as_str()).or_default() += 1;
    }
    for id in keep_song_ids {
        if let Some(count) = surplus.get_mut(id.as_str()) {
            *count = count.saturating_sub(1);
        }
    }

    let mut wanted: HashMap<&str, usize> = HashMap::new();
    for id in stale_song_ids {
        *wanted.entry(id.as_str()).or_default() += 1;
    }

    let mut positions = Vec::new();
    for (position, id) in entries.iter().enumerate() {
        let id = id.as_str();
        let (Some(want), Some(spare)) = (wanted.get_mut(id), surplus.get_mut(id)) else {
            continue;
        };
        if *want > 0 && *spare > 0 {
            *want -= 1;
            *spare -= 1;
            positions.push(position);
        }
    }

    positions
}

pub(crate) fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ExportError::Cancelled)
    } else {
        Ok(())
    }
}

pub struct PlaylistExporter<D: ?Sized> {
    destination: Arc<D>,
}

impl<D: DestinationCatalog + ?Sized> PlaylistExporter<D> {
    pub fn new(destination: Arc<D>) -> Self {
        Self { destination }
    }

    pub async fn export<F>(
        &self,
        matches: &[TrackMatch],
        request: PlaylistExportRequest<'_>,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<PlaylistExportResult>
    where
        F: FnMut(ExportProgress),
    {
        let started = Instant::now();
        let plan = plan_export(matches, &request)?;
        check(cancel)?;
        progress(ExportProgress::new(
            ExportPhase::Preparing,
            format!("Preparing {} export of {}", request.mode, request.playlist_name),
        ));

        let mut result = PlaylistExportResult {
            success: true,
            mode: request.mode,
            playlist_id: request.existing_playlist_id.map(str::to_string),
            statistics: plan.statistics,
            removed: 0,
            errors: plan.errors,
            duration: Duration::ZERO,
        };

        let applied = match plan.action {
            PlanAction::Create { name, song_ids } => {
                if song_ids.is_empty() {
                    tracing::debug!(playlist = %name, "nothing to export, no playlist created");
                    Ok(None)
                } else {
                    self.destination
                        .create_playlist(&name, &song_ids)
                        .await
                        .map(Some)
                }
            }
            PlanAction::Append {
                playlist_id,
                song_ids,
            } => self
                .destination
                .update_playlist_membership(&playlist_id, &song_ids, &[])
                .await
                .map(|_| Some(playlist_id)),
            PlanAction::Overwrite {
                playlist_id,
                song_ids,
            } => self
                .destination
                .replace_playlist_membership(&playlist_id, &song_ids)
                .await
                .map(|_| Some(playlist_id)),
            PlanAction::Update {
                playlist_id,
                add_ids,
                stale_song_ids,
                keep_song_ids,
                pending_song_ids,
            } => {
                check(cancel)?;
                let add_ids = if pending_song_ids.is_empty() {
                    add_ids
                } else {
                    self.without_written(&playlist_id, add_ids, &keep_song_ids, &pending_song_ids)
                        .await
                };
                let added = if add_ids.is_empty() {
                    Ok(())
                } else {
                    self.destination
                        .update_playlist_membership(&playlist_id, &add_ids, &[])
                        .await
                };

                match added {
                    Ok(()) => {
                        progress(ExportProgress::new(
                            ExportPhase::AddingTracks,
                            format!("Added {} tracks", add_ids.len()),
                        ));
                        check(cancel)?;
                        if !stale_song_ids.is_empty() {
                            result.removed = self
                                .remove_stale(&playlist_id, &stale_song_ids, &keep_song_ids)
                                .await;
                        }
                        progress(ExportProgress::new(
                            ExportPhase::RemovingTracks,
                            format!("Removed {} tracks", result.removed),
                        ));
                        Ok(Some(playlist_id))
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match applied {
            Ok(Some(playlist_id)) => result.playlist_id = Some(playlist_id),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(playlist = %request.playlist_name, error = %err, "playlist export failed");
                result.success = false;
                result.statistics.failed += result.statistics.exported;
                result.statistics.exported = 0;
                result.errors.push(ExportErrorEntry {
                    track_name: request.playlist_name.to_string(),
                    artist_name: String::new(),
                    reason: err.to_string(),
                });
                result.duration = started.elapsed();
                progress(ExportProgress::new(ExportPhase::Failed, err.to_string()));
                return Ok(result);
            }
        }

        if let (Some(playlist_id), Some(descriptor)) = (&result.playlist_id, request.descriptor) {
            check(cancel)?;
            self.write_descriptor(playlist_id, descriptor).await;
            if request.mode == ExportMode::Update {
                progress(ExportProgress::new(
                    ExportPhase::UpdatingDescriptor,
                    "Updated export descriptor",
                ));
            }
        }

        result.duration = started.elapsed();
        progress(ExportProgress::new(
            ExportPhase::Completed,
            format!(
                "Exported {} of {} tracks",
                result.statistics.exported, result.statistics.total
            ),
        ));
        Ok(result)
    }

    /// Drops pending ids whose song is already in the playlist beyond what
    /// the written tracks account for.
    async fn without_written(
        &self,
        playlist_id: &str,
        add_ids: Vec<String>,
        keep_song_ids: &[String],
        pending_song_ids: &[String],
    ) -> Vec<String> {
        let entries = match self.destination.playlist_song_ids(playlist_id).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(playlist_id, error = %err, "cannot read playlist entries, adding pending tracks");
                return add_ids;
            }
        };

        let mut spare: HashMap<&str, isize> = HashMap::new();
        for id in &entries {
            *spare.entry(id.as_str()).or_default() += 1;
        }
        for id in keep_song_ids {
            *spare.entry(id.as_str()).or_default() -= 1;
        }
        for id in &add_ids {
            *spare.entry(id.as_str()).or_default() += 1;
        }

        let mut pending: HashMap<&str, usize> = HashMap::new();
        for id in pending_song_ids {
            *pending.entry(id.as_str()).or_default() += 1;
        }

        let mut kept = Vec::with_capacity(add_ids.len());
        for id in &add_ids {
            let key = id.as_str();
            let (Some(want), Some(left)) = (pending.get_mut(key), spare.get_mut(key)) else {
                kept.push(id.clone());
                continue;
            };
            if *want > 0 && *left > 0 {
                *want -= 1;
                *left -= 1;
            } else {
                kept.push(id.clone());
            }
        }

        if kept.len() < add_ids.len() {
            tracing::debug!(
                playlist_id,
                skipped = add_ids.len() - kept.len(),
                "pending tracks already in the playlist"
            );
        }
        kept
    }

    async fn remove_stale(
        &self,
        playlist_id: &str,
        stale_song_ids: &[String],
        keep_song_ids: &[String],
    ) -> usize {
        let entries = match self.destination.playlist_song_ids(playlist_id).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(playlist_id, error = %err, "cannot read playlist entries, stale tracks kept");
                return 0;
            }
        };

        let positions = stale_positions(&entries, stale_song_ids, keep_song_ids);
        if positions.is_empty() {
            return 0;
        }

        match self
            .destination
            .update_playlist_membership(playlist_id, &[], &positions)
            .await
        {
            Ok(()) => positions.len(),
            Err(err) => {
                tracing::warn!(playlist_id, error = %err, "failed to remove stale tracks");
                0
            }
        }
    }

    /// Writes the descriptor, logging instead of failing.
    pub async fn write_descriptor(&self, playlist_id: &str, mut descriptor: ExportDescriptor) {
        descriptor.destination_playlist_id = Some(playlist_id.to_string());
        if let Err(err) = self
            .destination
            .write_playlist_descriptor(playlist_id, &descriptor)
            .await
        {
            tracing::warn!(playlist_id, error = %err, "failed to write export descriptor");
        }
    }
}
