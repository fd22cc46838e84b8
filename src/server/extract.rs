//! Request extractors for key-addressed endpoints.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::common::AppError;
use crate::server::state::AppState;

/// Transfer key taken from the `:key` path segment.
///
/// Keys that do not match the configured alphabet and length are rejected
/// as if no route matched.
pub struct TransferKey(pub String);

#[async_trait]
impl FromRequestParts<AppState> for TransferKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(key) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("not found".to_string()))?;

        if !state.keygen.is_valid(&key) {
            tracing::debug!(key = %key, "rejected malformed key");
            return Err(AppError::NotFound("not found".to_string()));
        }

        Ok(TransferKey(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AppConfig;
    use axum::{body::Body, http::Request, routing::get, Router};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn echo(TransferKey(key): TransferKey) -> String {
        key
    }

    fn app() -> Router {
        let state = AppState::new(AppConfig {
            key_charset: "ab".to_string(),
            key_length: 4,
            ..AppConfig::default()
        })
        .unwrap();
        Router::new().route("/k/:key", get(echo)).with_state(state)
    }

    async fn status_of(uri: &str) -> StatusCode {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn accepts_well_formed_key() {
        assert_eq!(status_of("/k/abba").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_wrong_length_or_charset() {
        assert_eq!(status_of("/k/abb").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("/k/abbaa").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("/k/abcd").await, StatusCode::NOT_FOUND);
    }
}
