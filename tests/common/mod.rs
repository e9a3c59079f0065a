//! In-process stand-in for the Spotify token and Web API endpoints.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
    routing::{get, post},
    Router,
};
use genre_dashboard::spotify::{ClientConfig, RetryPolicy, SpotifyClient};
use tokio::net::TcpListener;

/// One canned response.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Reply {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![],
            body: body.to_string(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: vec![],
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(self.status)
            .header("Content-Type", "application/json");
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(self.body))
            .expect("valid canned response")
    }
}

/// A request the stand-in API received.
#[derive(Clone, Debug)]
pub struct Hit {
    pub at: Instant,
    pub path: String,
    pub query: String,
    pub authorization: String,
}

#[derive(Default)]
pub struct Upstream {
    pub token_hits: AtomicU32,
    pub api_hits: AtomicU32,
    token_replies: Mutex<VecDeque<Reply>>,
    api_replies: Mutex<VecDeque<Reply>>,
    api_log: Mutex<Vec<Hit>>,
    token_auth: Mutex<Vec<String>>,
    api_delay: Mutex<Duration>,
    token_delay: Mutex<Duration>,
}

impl Upstream {
    /// Queue a token endpoint reply. Unqueued calls get a fresh valid token.
    pub fn push_token(&self, reply: Reply) {
        self.token_replies.lock().unwrap().push_back(reply);
    }

    /// Queue an API reply. Unqueued calls get a two-track search page.
    pub fn push_api(&self, reply: Reply) {
        self.api_replies.lock().unwrap().push_back(reply);
    }

    pub fn set_api_delay(&self, delay: Duration) {
        *self.api_delay.lock().unwrap() = delay;
    }

    pub fn set_token_delay(&self, delay: Duration) {
        *self.token_delay.lock().unwrap() = delay;
    }

    pub fn token_count(&self) -> u32 {
        self.token_hits.load(Ordering::SeqCst)
    }

    pub fn api_count(&self) -> u32 {
        self.api_hits.load(Ordering::SeqCst)
    }

    pub fn api_log(&self) -> Vec<Hit> {
        self.api_log.lock().unwrap().clone()
    }

    pub fn token_authorizations(&self) -> Vec<String> {
        self.token_auth.lock().unwrap().clone()
    }
}

pub fn search_page(names: &[&str]) -> serde_json::Value {
    let items: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            serde_json::json!({
                "id": format!("track-{}", i),
                "name": name,
                "uri": format!("spotify:track:track-{}", i),
                "popularity": 40 + i,
                "duration_ms": 300000,
                "artists": [{ "id": "artist", "name": "Artist" }],
                "album": { "id": "album", "name": "Album", "images": [] },
                "external_urls": { "spotify": "https://open.spotify.com/track/x" }
            })
        })
        .collect();
    let total = items.len();
    serde_json::json!({
        "tracks": { "items": items, "total": total, "limit": 50, "offset": 0 }
    })
}

async fn token(State(up): State<Arc<Upstream>>, headers: HeaderMap) -> Response {
    let n = up.token_hits.fetch_add(1, Ordering::SeqCst) + 1;
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    up.token_auth.lock().unwrap().push(auth);

    let delay = *up.token_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let queued = up.token_replies.lock().unwrap().pop_front();
    queued
        .unwrap_or_else(|| {
            Reply::json(
                StatusCode::OK,
                serde_json::json!({
                    "access_token": format!("token-{}", n),
                    "token_type": "Bearer",
                    "expires_in": 3600
                }),
            )
        })
        .into_response()
}

async fn api(State(up): State<Arc<Upstream>>, uri: Uri, headers: HeaderMap) -> Response {
    up.api_hits.fetch_add(1, Ordering::SeqCst);
    up.api_log.lock().unwrap().push(Hit {
        at: Instant::now(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    });

    let delay = *up.api_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let queued = up.api_replies.lock().unwrap().pop_front();
    queued
        .unwrap_or_else(|| Reply::json(StatusCode::OK, search_page(&["First", "Second"])))
        .into_response()
}

/// Start the stand-in on an ephemeral port.
pub async fn spawn_upstream() -> (Arc<Upstream>, SocketAddr) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/api/token", post(token))
        .route("/v1/*rest", get(api))
        .with_state(Arc::clone(&upstream));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, addr)
}

/// Retry policy with a short backoff unit so timing tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(20),
        ..RetryPolicy::default()
    }
}

pub fn config_for(addr: SocketAddr, client_id: &str, client_secret: &str) -> ClientConfig {
    ClientConfig::new(client_id, client_secret)
        .with_api_base(format!("http://{}/v1", addr))
        .with_token_url(format!("http://{}/api/token", addr))
        .with_retry(fast_retry())
}

pub async fn client_with(retry: RetryPolicy) -> (Arc<Upstream>, SpotifyClient) {
    let (upstream, addr) = spawn_upstream().await;
    let client = SpotifyClient::with_config(config_for(addr, "id", "secret").with_retry(retry));
    (upstream, client)
}

pub async fn client() -> (Arc<Upstream>, SpotifyClient) {
    client_with(fast_retry()).await
}
