//! Exporting matches into the destination catalog and remembering what was
//! exported.

pub mod cache;
pub mod descriptor;
pub mod favorites;
pub mod pipeline;
pub mod playlist;

pub use cache::{
    ExportCacheStore, MemoryExportCache, PlaylistExportRecord, TrackExportStatus,
    is_playlist_up_to_date,
};
pub use descriptor::{ExportDescriptor, ExportStatus};
pub use favorites::FavoritesExporter;
pub use pipeline::{ExportOptions, ExportPipeline, PipelineEvent};
pub use playlist::{ExportMode, PlaylistExporter};
