//! # API Module
//!
//! HTTP handlers for the vibeify backend, built on [Axum](https://docs.rs/axum).
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - [`login`] - `GET /auth/login`, sets the signed `oauth_state` cookie and
//!   redirects (302) to the Spotify authorize endpoint
//! - [`callback`] - `GET /auth/callback`, verifies the state, exchanges the
//!   code, creates the session and redirects to the frontend
//! - [`logout`] - `POST /api/logout`
//! - [`logout_redirect`] - `GET /logout`, same as above but redirects to the
//!   frontend, for plain links
//! - [`refresh_token`] - `POST /api/refresh-token`
//!
//! ### Spotify passthrough
//!
//! [`me`], [`top_items`], [`recently_played`], [`playlists`],
//! [`audio_features`] and [`now_playing`] forward to the Web API through the
//! session's credentials.
//!
//! ### Aggregation
//!
//! - [`vibe_summary`] - `GET /api/vibe-summary`
//!
//! ### Monitoring
//!
//! - [`health`] - `GET /health`
//!
//! ## Sessions
//!
//! Every `/api` route takes a [`SessionId`], which resolves the signed
//! session cookie against the session store and rejects with 401 otherwise.
//! Cookies are signed with the key from the configuration (see
//! [`crate::config::derive_cookie_key`]); tampered values read as absent.
//!
//! ## Related Modules
//!
//! - [`crate::spotify`] - token client, proxy and aggregation
//! - [`crate::management`] - session store

pub mod cookies;

mod auth;
mod health;
mod session;
mod spotify;
mod summary;

pub use auth::{callback, login, logout, logout_redirect, refresh_token};
pub use health::health;
pub use session::SessionId;
pub use spotify::{audio_features, me, now_playing, playlists, recently_played, top_items};
pub use summary::vibe_summary;
