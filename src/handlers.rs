//! HTTP handlers serving the dashboard's data.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::spotify::{
    Country, PlaylistSearchResponse, SpotifyClient, Track, DEFAULT_MARKET, MAX_LIMIT,
};

const DEFAULT_COMPARE_LIMIT: u32 = 40;
const DEFAULT_PLAYLIST_LIMIT: u32 = 20;

/// Query parameters for genre lookups.
#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    #[serde(default)]
    pub market: Option<String>,
    /// Max results (1-50, default 50).
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Query parameters for the genre comparison.
#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /// Dashboard country code (GLOBAL, BR, DE, MX).
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Query parameters for track search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query (required).
    pub q: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Query parameters for playlist search.
#[derive(Debug, Deserialize)]
pub struct PlaylistSearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Single track in API response.
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub popularity: u32,
    pub duration_ms: u32,
    pub explicit: bool,
    pub preview_url: Option<String>,
    pub artists: Vec<ArtistResponse>,
    pub album: AlbumResponse,
    pub spotify_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArtistResponse {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub id: Option<String>,
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<TrackResponse>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub country: &'static str,
    pub country_name: &'static str,
    pub market: String,
    pub techno: Vec<TrackResponse>,
    pub psytrance: Vec<TrackResponse>,
}

fn track_to_response(t: &Track) -> TrackResponse {
    TrackResponse {
        id: t.id.clone(),
        name: t.name.clone(),
        uri: t.uri.clone(),
        popularity: t.popularity,
        duration_ms: t.duration_ms,
        explicit: t.explicit,
        preview_url: t.preview_url.clone(),
        artists: t
            .artists
            .iter()
            .map(|a| ArtistResponse {
                id: a.id.clone(),
                name: a.name.clone(),
            })
            .collect(),
        album: AlbumResponse {
            id: t.album.id.clone(),
            name: t.album.name.clone(),
            image_url: t.album.images.first().and_then(|i| i.url.clone()),
        },
        spotify_url: t.external_urls.spotify.clone(),
    }
}

fn tracks_response(tracks: &[Track]) -> TracksResponse {
    TracksResponse {
        tracks: tracks.iter().map(track_to_response).collect(),
    }
}

fn require_query(q: &str) -> Result<(), AppError> {
    if q.trim().is_empty() {
        return Err(AppError::BadRequest(
            "query 'q' is required and cannot be empty".into(),
        ));
    }
    Ok(())
}

/// GET /health - Health check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/genres/:genre/tracks - Tracks for a genre in one market.
pub async fn genre_tracks(
    State(spotify): State<SpotifyClient>,
    Path(genre): Path<String>,
    Query(params): Query<GenreQuery>,
) -> Result<impl IntoResponse, AppError> {
    let market = params.market.as_deref().unwrap_or(DEFAULT_MARKET);
    let tracks = spotify
        .get_tracks_by_genre_and_market(&genre, market, params.limit.unwrap_or(MAX_LIMIT))
        .await?;
    Ok((StatusCode::OK, Json(tracks_response(&tracks))))
}

/// GET /api/v1/genres/compare - Techno vs psytrance for a dashboard country.
pub async fn compare(
    State(spotify): State<SpotifyClient>,
    Query(params): Query<CompareQuery>,
) -> Result<impl IntoResponse, AppError> {
    let country = match params.country.as_deref() {
        Some(code) => code.parse::<Country>().map_err(AppError::BadRequest)?,
        None => Country::Global,
    };
    let comparison = spotify
        .compare_genres(country, params.limit.unwrap_or(DEFAULT_COMPARE_LIMIT))
        .await?;

    let response = CompareResponse {
        country: country.code(),
        country_name: country.display_name(),
        market: comparison.market,
        techno: comparison.techno.iter().map(track_to_response).collect(),
        psytrance: comparison.psytrance.iter().map(track_to_response).collect(),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/v1/search - Search Spotify for tracks.
pub async fn search(
    State(spotify): State<SpotifyClient>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_query(&params.q)?;
    let market = params.market.as_deref().unwrap_or(DEFAULT_MARKET);
    let tracks = spotify
        .search_tracks(&params.q, market, params.limit.unwrap_or(MAX_LIMIT))
        .await?;
    Ok((StatusCode::OK, Json(tracks_response(&tracks))))
}

/// GET /api/v1/playlists/search - Search Spotify for playlists.
pub async fn search_playlists(
    State(spotify): State<SpotifyClient>,
    Query(params): Query<PlaylistSearchQuery>,
) -> Result<Json<PlaylistSearchResponse>, AppError> {
    require_query(&params.q)?;
    let result = spotify
        .search_playlists(
            &params.q,
            params.limit.unwrap_or(DEFAULT_PLAYLIST_LIMIT),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/tracks/:id - One track.
pub async fn track(
    State(spotify): State<SpotifyClient>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let track = spotify.get_track_details(&id).await?;
    Ok((StatusCode::OK, Json(track_to_response(&track))))
}

/// GET /api/v1/playlists/:id/tracks - Tracks of a playlist.
pub async fn playlist_tracks(
    State(spotify): State<SpotifyClient>,
    Path(id): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tracks = spotify
        .get_playlist_tracks(&id, params.limit.unwrap_or(DEFAULT_PLAYLIST_LIMIT))
        .await?;
    Ok((StatusCode::OK, Json(tracks_response(&tracks))))
}

/// POST /api/v1/cache/clear - Reset token and in-flight request table.
pub async fn clear_cache(State(spotify): State<SpotifyClient>) -> impl IntoResponse {
    spotify.clear_auth_cache().await;
    StatusCode::NO_CONTENT
}

/// Build the API router.
pub fn router() -> Router<SpotifyClient> {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/genres/compare", get(compare))
        .route("/api/v1/genres/:genre/tracks", get(genre_tracks))
        .route("/api/v1/search", get(search))
        .route("/api/v1/playlists/search", get(search_playlists))
        .route("/api/v1/playlists/:id/tracks", get(playlist_tracks))
        .route("/api/v1/tracks/:id", get(track))
        .route("/api/v1/cache/clear", post(clear_cache))
}
