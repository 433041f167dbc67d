//! # Spotify Integration Module
//!
//! Read-only access to the Spotify Web API: the user's playlists, the tracks
//! of a playlist and the user's liked songs. [`SpotifyClient`] implements
//! [`crate::catalog::SourceCatalog`] and is the source side of every export.
//!
//! ## API Coverage
//!
//! - `GET /me/playlists` - the user's playlists, 50 per page
//! - `GET /playlists/{id}/tracks` - playlist items, 100 per page
//! - `GET /me/tracks` - liked songs, 50 per page
//!
//! Pagination follows the `next` links Spotify returns. Items that cannot be
//! matched (removed tracks reported as `null`, local files and podcast
//! episodes) are skipped.
//!
//! ## Error Handling
//!
//! - **502 Bad Gateway** is retried after a 10 second pause.
//! - **429 Too Many Requests** waits for the `Retry-After` delay when it is at
//!   most two minutes and fails with [`crate::error::CatalogError::Api`] otherwise.
//! - Any other non-success status becomes a `CatalogError::Api` carrying the
//!   response body.
//!
//! ## Authentication
//!
//! Requests carry a bearer token obtained from
//! [`crate::management::TokenManager`], which refreshes it through the
//! refresh-token grant shortly before it expires.

mod client;

pub use client::SpotifyClient;
