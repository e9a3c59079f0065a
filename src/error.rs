use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::spotify::ApiError;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    Spotify(ApiError),
    BadRequest(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Spotify(err)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Spotify(err) => match err.root() {
                ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::Client { status: 404, .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Spotify(err) => err.to_string(),
            AppError::BadRequest(msg) => msg,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_looks_through_context() {
        let not_found = ApiError::Client {
            status: 404,
            message: "Not Found".into(),
        }
        .context("could not fetch tracks of playlist x");
        assert_eq!(AppError::from(not_found).status(), StatusCode::NOT_FOUND);

        let config = ApiError::Configuration("set CLIENT_ID".into());
        assert_eq!(
            AppError::from(config).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let exhausted = ApiError::RequestExhausted {
            endpoint: "/search".into(),
            attempts: 3,
            last: None,
        };
        assert_eq!(AppError::from(exhausted).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::BadRequest("q".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
