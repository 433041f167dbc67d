//! # Navidrome Integration Module
//!
//! [`NavidromeClient`] implements [`crate::catalog::DestinationCatalog`] on top
//! of two Navidrome APIs:
//!
//! - the native REST API (`/auth/login`, `/api/artist`, `/api/song`,
//!   `/api/playlist`) for catalog searches and playlist management, and
//! - the Subsonic API (`/rest/star`, `/rest/unstar`) for favorites.
//!
//! Native requests carry the session token from `/auth/login`; an expired
//! session is renewed once per request. Subsonic requests use salted-token
//! authentication (`t = md5(password + salt)`).
//!
//! Export descriptors live in the playlist comment, next to whatever else the
//! user wrote there.

mod client;

pub use client::NavidromeClient;
