//! Data backend for the techno vs psytrance dashboard.
//!
//! Wraps the Spotify Web API behind a client that caches its access token,
//! coalesces identical in-flight requests and retries transient failures,
//! and serves the results as JSON over HTTP.

pub mod config;
pub mod error;
pub mod handlers;
pub mod spotify;

pub use config::Config;
pub use handlers::router;
pub use spotify::{ApiError, ClientConfig, SpotifyClient};
