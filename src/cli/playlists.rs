use std::collections::HashMap;

use tabled::Table;

use crate::{
    catalog::{DestinationCatalog, SourceCatalog},
    error,
    export::{ExportCacheStore, descriptor::resolve_export_status},
    management::FileExportCache,
    navidrome::NavidromeClient,
    spotify::SpotifyClient,
    types::PlaylistTableRow,
    utils, warning,
};

pub async fn list_playlists(search: Option<String>) {
    let source = match SpotifyClient::from_env().await {
        Ok(client) => client,
        Err(e) => error!("Cannot set up Spotify client. Err: {}", e),
    };

    let pb = utils::spinner("Fetching Spotify playlists...");
    let mut playlists = match source.list_playlists().await {
        Ok(playlists) => playlists,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch playlists: {}", e);
        }
    };

    pb.set_message("Fetching Navidrome playlists...");
    let destination_playlists = match NavidromeClient::from_env() {
        Ok(client) => client.list_playlists().await.unwrap_or_else(|e| {
            warning!("Failed to fetch Navidrome playlists: {}", e);
            Vec::new()
        }),
        Err(e) => {
            warning!("Navidrome is not configured, using the local cache only. Err: {}", e);
            Vec::new()
        }
    };
    pb.finish_and_clear();

    let records: HashMap<String, _> = match FileExportCache::new().list_all().await {
        Ok(records) => records
            .into_iter()
            .map(|r| (r.source_playlist_id.clone(), r))
            .collect(),
        Err(e) => {
            warning!("Failed to read the export cache: {}", e);
            HashMap::new()
        }
    };

    utils::filter_playlists(&mut playlists, search.as_deref());

    let table_rows: Vec<PlaylistTableRow> = playlists
        .iter()
        .map(|p| {
            let status = resolve_export_status(p, &destination_playlists, records.get(&p.id));
            PlaylistTableRow {
                id: p.id.clone(),
                name: utils::truncate(&p.name, 40),
                tracks: p.track_count,
                status: status.status.to_string(),
                exported_at: utils::format_timestamp(status.exported_at),
            }
        })
        .collect();

    let table = Table::new(table_rows);
    println!("{}", table);
}
