//! Spotify Web API client.
//!
//! Uses Client Credentials flow for server-to-server authentication. Every
//! resource call goes through the in-flight request table, so concurrent
//! identical calls share one retry sequence and one outcome.

mod dedup;
mod error;
mod genre;
mod retry;
mod token;
mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::ApiError;
pub use genre::{
    clamp_limit, search_keywords, Country, DASHBOARD_GENRES, DEFAULT_MARKET, MAX_LIMIT,
};
pub use retry::RetryPolicy;
pub use token::{Credentials, TOKEN_EXPIRY_MARGIN};
pub use types::{
    Album, Artist, ExternalUrls, GenreComparison, Image, Page, PlaylistOwner,
    PlaylistSearchResponse, PlaylistSummary, PlaylistTracksRef, Track,
};

use dedup::RequestTable;
use retry::Executor;
use token::TokenManager;
use types::{PlaylistTracksResponse, TrackSearchResponse};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE: &str = "https://api.spotify.com/v1";

const PLAYLIST_TRACK_FIELDS: &str =
    "items(track(id,name,artists,album,popularity,duration_ms,preview_url,external_urls))";

/// Everything needed to build a [`SpotifyClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub api_base: String,
    pub token_url: String,
    pub retry: RetryPolicy,
    pub token_margin: Duration,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(client_id, client_secret),
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            retry: RetryPolicy::default(),
            token_margin: TOKEN_EXPIRY_MARGIN,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_token_margin(mut self, margin: Duration) -> Self {
        self.token_margin = margin;
        self
    }
}

/// Spotify API client with token caching and request coalescing.
///
/// Cheap to clone; clones share the token cache and request table.
#[derive(Clone)]
pub struct SpotifyClient {
    tokens: Arc<TokenManager>,
    executor: Arc<Executor>,
    requests: Arc<RequestTable<Value>>,
}

/// Canonical query string: parameters sorted by name, then value.
fn canonical_query(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort();
    sorted
        .into_iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_config(ClientConfig::new(client_id, client_secret))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let http = Client::new();
        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            config.token_url,
            config.credentials,
            config.retry,
            config.token_margin,
        ));
        let executor = Arc::new(Executor::new(
            http,
            config.api_base,
            Arc::clone(&tokens),
            config.retry,
        ));
        Self {
            tokens,
            executor,
            requests: Arc::new(RequestTable::new()),
        }
    }

    /// Current access token, renewing it if it is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        self.tokens.get_token().await
    }

    /// Issue a coalesced, retried GET and shape the JSON into `T`.
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let query = canonical_query(params);
        let key = format!("{}?{}", endpoint, query);
        let executor = Arc::clone(&self.executor);
        let endpoint = endpoint.to_string();

        let value = self
            .requests
            .execute(key, move || async move {
                executor.request(&endpoint, &query).await
            })
            .await?;

        serde_json::from_value(value)
            .map_err(|e| ApiError::Protocol(format!("unexpected response shape: {}", e)))
    }

    /// Search tracks for a genre in one market.
    pub async fn get_tracks_by_genre_and_market(
        &self,
        genre: &str,
        market: &str,
        limit: u32,
    ) -> Result<Vec<Track>, ApiError> {
        tracing::info!(genre, market, "searching genre tracks");
        let params = [
            ("q", search_keywords(genre)),
            ("type", "track".to_string()),
            ("limit", clamp_limit(limit).to_string()),
            ("market", market.to_string()),
        ];

        match self.request::<TrackSearchResponse>("/search", &params).await {
            Ok(body) => {
                let tracks = body.tracks.items;
                tracing::info!(genre, market, count = tracks.len(), "found genre tracks");
                Ok(tracks)
            }
            Err(e) => {
                tracing::error!(genre, market, error = %e, "genre search failed");
                Err(e.context(format!("could not fetch {} tracks for {}", genre, market)))
            }
        }
    }

    /// [`get_tracks_by_genre_and_market`](Self::get_tracks_by_genre_and_market)
    /// with the default market and the maximum limit.
    pub async fn get_tracks_by_genre(&self, genre: &str) -> Result<Vec<Track>, ApiError> {
        self.get_tracks_by_genre_and_market(genre, DEFAULT_MARKET, MAX_LIMIT)
            .await
    }

    /// Free-text track search.
    pub async fn search_tracks(
        &self,
        query: &str,
        market: &str,
        limit: u32,
    ) -> Result<Vec<Track>, ApiError> {
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", clamp_limit(limit).to_string()),
            ("market", market.to_string()),
        ];
        let body: TrackSearchResponse = self.request("/search", &params).await?;
        Ok(body.tracks.items)
    }

    /// Playlist search.
    pub async fn search_playlists(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistSearchResponse, ApiError> {
        let params = [
            ("q", query.to_string()),
            ("type", "playlist".to_string()),
            ("limit", clamp_limit(limit).to_string()),
            ("offset", offset.to_string()),
        ];
        self.request("/search", &params).await.map_err(|e| {
            tracing::error!(query, error = %e, "playlist search failed");
            e.context(format!("could not search playlists for \"{}\"", query))
        })
    }

    /// Full metadata for one track.
    pub async fn get_track_details(&self, track_id: &str) -> Result<Track, ApiError> {
        let endpoint = format!("/tracks/{}", urlencoding::encode(track_id));
        self.request(&endpoint, &[]).await
    }

    /// Tracks of a playlist, skipping entries whose track is unavailable.
    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
    ) -> Result<Vec<Track>, ApiError> {
        let endpoint = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let params = [
            ("limit", clamp_limit(limit).to_string()),
            ("fields", PLAYLIST_TRACK_FIELDS.to_string()),
            ("market", DEFAULT_MARKET.to_string()),
        ];

        match self.request::<PlaylistTracksResponse>(&endpoint, &params).await {
            Ok(body) => Ok(body.items.into_iter().filter_map(|i| i.track).collect()),
            Err(e) => {
                tracing::error!(playlist_id, error = %e, "playlist tracks request failed");
                Err(e.context(format!("could not fetch tracks of playlist {}", playlist_id)))
            }
        }
    }

    /// Fetch both dashboard genres for a country's market concurrently.
    pub async fn compare_genres(
        &self,
        country: Country,
        limit: u32,
    ) -> Result<GenreComparison, ApiError> {
        let market = country.market();
        let [techno_genre, psytrance_genre] = DASHBOARD_GENRES;

        let (techno, psytrance) = tokio::join!(
            self.get_tracks_by_genre_and_market(techno_genre, market, limit),
            self.get_tracks_by_genre_and_market(psytrance_genre, market, limit),
        );

        Ok(GenreComparison {
            market: market.to_string(),
            techno: techno?,
            psytrance: psytrance?,
        })
    }

    /// Drop the cached token and forget every in-flight request.
    pub async fn clear_auth_cache(&self) {
        self.tokens.clear().await;
        self.requests.clear();
        tracing::info!("authentication cache cleared");
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight_requests(&self) -> usize {
        self.requests.len()
    }
}
