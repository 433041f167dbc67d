use tabled::Table;

use crate::{
    error,
    export::ExportCacheStore,
    info,
    management::FileExportCache,
    success,
    types::CacheTableRow,
    utils, warning,
};

pub async fn list_cache() {
    let cache = FileExportCache::new();
    let records = match cache.list_all().await {
        Ok(records) => records,
        Err(e) => error!("Failed to read the export cache: {}", e),
    };

    if records.is_empty() {
        info!("No exports recorded yet in {}", cache.root().display());
        return;
    }

    let table_rows: Vec<CacheTableRow> = records
        .into_iter()
        .map(|r| CacheTableRow {
            playlist: utils::truncate(&r.playlist_name, 40),
            snapshot: utils::truncate(&r.source_snapshot_id, 16),
            destination: r.destination_playlist_id.unwrap_or_else(|| "-".to_string()),
            total: r.statistics.total,
            matched: r.statistics.matched,
            ambiguous: r.statistics.ambiguous,
            unmatched: r.statistics.unmatched,
            exported_at: utils::format_timestamp(Some(r.exported_at)),
        })
        .collect();

    let table = Table::new(table_rows);
    println!("{}", table);
}

pub async fn clear_cache(source_playlist_id: &str) {
    match FileExportCache::new().remove(source_playlist_id).await {
        Ok(true) => success!("Removed export record for {}", source_playlist_id),
        Ok(false) => warning!("No export record for {}", source_playlist_id),
        Err(e) => error!("Failed to remove export record: {}", e),
    }
}
