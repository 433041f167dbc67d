//! Export descriptors embedded in destination playlists.
//!
//! After an export the destination playlist's comment carries a line
//! `navispot:{json}` describing which source playlist and snapshot it was
//! generated from. Reading it back lets a cleared local cache rediscover
//! playlists that were already exported.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    export::cache::PlaylistExportRecord,
    types::{DestinationPlaylist, SourcePlaylist},
};

pub const DESCRIPTOR_MARKER: &str = "navispot:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDescriptor {
    pub source_playlist_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_playlist_id: Option<String>,
    pub source_snapshot_id: String,
    pub exported_at: DateTime<Utc>,
    pub track_count: usize,
}

impl ExportDescriptor {
    pub fn from_record(record: &PlaylistExportRecord) -> Self {
        Self {
            source_playlist_id: record.source_playlist_id.clone(),
            destination_playlist_id: record.destination_playlist_id.clone(),
            source_snapshot_id: record.source_snapshot_id.clone(),
            exported_at: record.exported_at,
            track_count: record.track_count,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}{}", DESCRIPTOR_MARKER, serde_json::to_string(self)?))
    }
}

/// Extracts the descriptor from a playlist comment, if it carries one.
pub fn parse_descriptor(comment: &str) -> Option<ExportDescriptor> {
    comment
        .lines()
        .filter_map(|line| line.trim().strip_prefix(DESCRIPTOR_MARKER))
        .find_map(|json| serde_json::from_str(json.trim()).ok())
}

/// Returns `existing` with its descriptor line replaced by `descriptor`.
/// Other comment lines are kept.
pub fn embed_descriptor(
    existing: Option<&str>,
    descriptor: &ExportDescriptor,
) -> Result<String, serde_json::Error> {
    let mut lines: Vec<String> = existing
        .unwrap_or_default()
        .lines()
        .filter(|line| !line.trim().starts_with(DESCRIPTOR_MARKER))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    lines.push(descriptor.encode()?);
    Ok(lines.join("\n"))
}

/// The destination playlist whose descriptor points at `source_playlist_id`.
pub fn find_exported_playlist<'a>(
    playlists: &'a [DestinationPlaylist],
    source_playlist_id: &str,
) -> Option<&'a DestinationPlaylist> {
    playlists.iter().find(|p| {
        p.descriptor
            .as_ref()
            .is_some_and(|d| d.source_playlist_id == source_playlist_id)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    NotExported,
    Exported,
    OutOfSync,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportStatus::NotExported => "not exported",
            ExportStatus::Exported => "exported",
            ExportStatus::OutOfSync => "out of sync",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportStatusInfo {
    pub status: ExportStatus,
    pub destination_playlist_id: Option<String>,
    pub exported_at: Option<DateTime<Utc>>,
}

fn snapshot_status(exported: &str, current: &str) -> ExportStatus {
    if !current.is_empty() && exported == current {
        ExportStatus::Exported
    } else {
        ExportStatus::OutOfSync
    }
}

/// Export status of a source playlist. Destination descriptors take
/// precedence over the local cache.
pub fn resolve_export_status(
    playlist: &SourcePlaylist,
    destination_playlists: &[DestinationPlaylist],
    record: Option<&PlaylistExportRecord>,
) -> ExportStatusInfo {
    if let Some(found) = find_exported_playlist(destination_playlists, &playlist.id) {
        if let Some(descriptor) = &found.descriptor {
            return ExportStatusInfo {
                status: snapshot_status(&descriptor.source_snapshot_id, &playlist.snapshot_id),
                destination_playlist_id: Some(found.id.clone()),
                exported_at: Some(descriptor.exported_at),
            };
        }
    }

    match record {
        Some(record) if record.destination_playlist_id.is_some() => ExportStatusInfo {
            status: snapshot_status(&record.source_snapshot_id, &playlist.snapshot_id),
            destination_playlist_id: record.destination_playlist_id.clone(),
            exported_at: Some(record.exported_at),
        },
        _ => ExportStatusInfo {
            status: ExportStatus::NotExported,
            destination_playlist_id: None,
            exported_at: None,
        },
    }
}
