//! Spotify to Navidrome export library
//!
//! This library matches the tracks of Spotify playlists (and the liked songs)
//! against a Navidrome catalog and mirrors them as Navidrome playlists or
//! starred songs. Every export is remembered locally so that a later run only
//! matches what changed.
//!
//! # Modules
//!
//! - `catalog` - Capability traits for the source and destination catalogs
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error types shared by the library
//! - `export` - Export cache, descriptors, exporters and the export pipeline
//! - `management` - On-disk persistence of export records and tokens
//! - `matching` - Similarity scoring, match strategies and batch matching
//! - `navidrome` - Navidrome API client implementation
//! - `spotify` - Spotify Web API client implementation
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use navispot::{config, cli};
//!
//! #[tokio::main]
//! async fn main() -> navispot::Res<()> {
//!     config::load_env().await?;
//!     cli::list_playlists(None).await;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod management;
pub mod matching;
pub mod navidrome;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for top-level operations that may fail.
///
/// Library components return their own typed errors (see [`error`]); the
/// command layer collects them behind this boxed error so that different
/// failures can be reported the same way.
///
/// # Example
///
/// ```
/// use navispot::Res;
///
/// async fn fetch_data() -> Res<String> {
///     Ok("data".to_string())
/// }
/// ```
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints a progress or status line prefixed with a blue `o`.
///
/// Takes the same arguments as `println!`.
///
/// ```
/// info!("Fetching playlists...");
/// info!("Found {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a completion line prefixed with a green checkmark.
///
/// ```
/// success!("Exported {} of {} tracks", exported, total);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a fatal error prefixed with a red `!` and exits with status 1.
///
/// Only for the command layer: library code returns typed errors instead.
/// The macro never returns, so it can stand in for a value:
///
/// ```
/// let source = SpotifyClient::from_env()
///     .await
///     .unwrap_or_else(|e| error!("Cannot create Spotify client: {}", e));
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a recoverable problem prefixed with a yellow `!`.
///
/// ```
/// warning!("{} tracks could not be matched", count);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
