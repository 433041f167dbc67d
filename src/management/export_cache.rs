use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    error::CacheError,
    export::cache::{ExportCacheStore, PlaylistExportRecord},
};

/// Export records stored as one pretty-printed JSON file per source playlist
/// under `navispot/cache/exports/` in the local data directory.
pub struct FileExportCache {
    root: PathBuf,
}

impl FileExportCache {
    pub fn new() -> Self {
        let mut root = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        root.push("navispot/cache/exports");
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn record_path(&self, source_playlist_id: &str) -> PathBuf {
        let file_name: String = source_playlist_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }

    async fn read_record(path: &PathBuf) -> Result<PlaylistExportRecord, CacheError> {
        let content = async_fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for FileExportCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExportCacheStore for FileExportCache {
    async fn get(
        &self,
        source_playlist_id: &str,
    ) -> Result<Option<PlaylistExportRecord>, CacheError> {
        let path = self.record_path(source_playlist_id);
        match Self::read_record(&path).await {
            Ok(record) => Ok(Some(record)),
            Err(CacheError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set(&self, record: &PlaylistExportRecord) -> Result<(), CacheError> {
        async_fs::create_dir_all(&self.root).await?;

        let json = serde_json::to_string_pretty(record)?;
        async_fs::write(self.record_path(&record.source_playlist_id), json).await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PlaylistExportRecord>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable export record")
                }
            }
        }

        records.sort_by(|a, b| a.playlist_name.cmp(&b.playlist_name));
        Ok(records)
    }

    async fn remove(&self, source_playlist_id: &str) -> Result<bool, CacheError> {
        match async_fs::remove_file(self.record_path(source_playlist_id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
