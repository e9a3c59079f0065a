//! Data transfer shapes returned by the Spotify Web API.

use serde::{Deserialize, Serialize};

/// A page of results.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Deserialize)]
pub(crate) struct TrackSearchResponse {
    pub(crate) tracks: Page<Track>,
}

/// Response of a playlist search.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlaylistSearchResponse {
    /// Spotify occasionally returns `null` entries here.
    pub playlists: Page<Option<PlaylistSummary>>,
}

#[derive(Deserialize)]
pub(crate) struct PlaylistTracksResponse {
    pub(crate) items: Vec<PlaylistItem>,
}

#[derive(Deserialize)]
pub(crate) struct PlaylistItem {
    #[serde(default)]
    pub(crate) track: Option<Track>,
}

/// A Spotify track (simplified).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub duration_ms: u32,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct Album {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct Image {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<PlaylistOwner>,
    #[serde(default)]
    pub tracks: Option<PlaylistTracksRef>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlaylistOwner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlaylistTracksRef {
    pub total: u32,
}

/// Both dashboard genres fetched for one market.
#[derive(Clone, Debug, Serialize)]
pub struct GenreComparison {
    pub market: String,
    pub techno: Vec<Track>,
    pub psytrance: Vec<Track>,
}
