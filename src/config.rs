use std::env;

use crate::spotify::{ClientConfig, API_BASE, TOKEN_URL};

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub api_base: String,
    pub token_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source. Values are trimmed; blanks count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8081);

        let spotify_client_id = var("CLIENT_ID").unwrap_or_default();
        let spotify_client_secret = var("CLIENT_SECRET").unwrap_or_default();
        if spotify_client_id.is_empty() || spotify_client_secret.is_empty() {
            tracing::warn!(
                "Spotify credentials are missing: add CLIENT_ID and CLIENT_SECRET to the \
                 environment or .env file; every Spotify request will fail until then"
            );
        }

        let api_base = var("SPOTIFY_API_BASE").unwrap_or_else(|| API_BASE.to_string());
        let token_url = var("SPOTIFY_TOKEN_URL").unwrap_or_else(|| TOKEN_URL.to_string());

        Self {
            port,
            spotify_client_id,
            spotify_client_secret,
            api_base,
            token_url,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.spotify_client_id, &self.spotify_client_secret)
            .with_api_base(&self.api_base)
            .with_token_url(&self.token_url)
    }
}
