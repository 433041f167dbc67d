//! # CLI Module
//!
//! Command implementations behind the `navispot` binary. Each command builds
//! the clients it needs from the environment, drives the library and renders
//! the result with progress bars and tables.
//!
//! ## Commands
//!
//! - [`list_playlists`] - Spotify playlists with their export status
//! - [`export`] - Match and export playlists or the liked songs
//! - [`list_cache`] / [`clear_cache`] - Inspect or drop persisted export records
//!
//! ## Error Handling
//!
//! Missing configuration and unreachable catalogs are fatal and reported
//! through [`crate::error!`]. Failures that only affect one playlist are
//! reported with [`crate::warning!`] and the command moves on to the next one.
//!
//! ## Cancellation
//!
//! `export` installs a Ctrl-C handler that fires a
//! [`tokio_util::sync::CancellationToken`]. Matching stops at the next track
//! boundary and whatever was matched so far is kept in the export cache.
//!
//! ## Usage Patterns
//!
//! ```bash
//! navispot playlists --search rock        # Find playlists
//! navispot export 37i9dQZF1DXcBWIGoYBM5M  # Export one playlist
//! navispot export --all --liked           # Export everything
//! navispot cache --clear liked-songs      # Forget the liked songs export
//! ```

mod cache;
mod export;
mod playlists;

pub use cache::clear_cache;
pub use cache::list_cache;
pub use export::ExportArgs;
pub use export::export;
pub use playlists::list_playlists;
