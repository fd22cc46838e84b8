//! HTTP handlers for key issuance, status, upload, and download.

use anyhow::Context;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Response},
    response::IntoResponse,
    Json,
};
use std::io;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::common::{AppError, TransferError};
use crate::relay::archive::{self, ArchiveChunk};
use crate::server::extract::TransferKey;
use crate::server::state::{AppState, UploadSource};
use crate::session::TransferStatus;
use crate::ui::web;

/// Zip chunks buffered between the archiver and the response body.
const ARCHIVE_CHANNEL_DEPTH: usize = 8;

/// Issue a fresh key and render the landing page around it.
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let key = state.keygen.new_unique_key(state.store())?;
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    tracing::debug!(key = %key, "issued key");
    Ok(web::serve_index_page(&key, host))
}

/// Current status token for a key.
pub async fn status(
    TransferKey(key): TransferKey,
    State(state): State<AppState>,
) -> Result<Json<TransferStatus>, AppError> {
    state
        .store()
        .get(&key)
        .map(Json)
        .ok_or_else(|| TransferError::NoSuchTransfer.into())
}

/// Park the multipart body under `key` until a downloader drains it or the
/// wait times out.
pub async fn upload(
    TransferKey(key): TransferKey,
    State(state): State<AppState>,
    source: UploadSource,
) -> Result<&'static str, AppError> {
    state.coordinator.begin_upload(&key, source).await?;
    Ok("ok")
}

/// Claim `key` and stream its files back as `<key>.zip`.
pub async fn download(
    TransferKey(key): TransferKey,
    State(state): State<AppState>,
) -> Result<Response<Body>, AppError> {
    let source = state.coordinator.claim_download(&key)?;
    let (tx, rx) = mpsc::channel::<ArchiveChunk>(ARCHIVE_CHANNEL_DEPTH);

    let coordinator = state.coordinator.clone();
    let task_key = key.clone();
    tokio::spawn(async move {
        match archive::write_archive(source, tx.clone()).await {
            Ok(summary) => {
                tracing::info!(
                    key = %task_key,
                    entries = summary.entries.len(),
                    bytes = summary.bytes_in,
                    "archive streamed"
                );
            }
            Err(err) => {
                tracing::warn!(key = %task_key, error = %err, "archive aborted");
                // Abort the response so the client sees a failed download
                let _ = tx.send(Err(io::Error::other(err.to_string()))).await;
            }
        }
        coordinator.complete_download(&task_key);
    });

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.zip\"", key),
        )
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .context("build response")?;

    Ok(response)
}
