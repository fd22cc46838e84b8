#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use handoff::common::AppConfig;
use handoff::server::{routes, AppState};
use handoff::session::TransferStatus;
use http_body_util::BodyExt;
use std::io::{Cursor, Read};
use std::time::Duration;

pub const BOUNDARY: &str = "----HandoffTestBoundary7MA4YWxk";

/// One multipart part: (form name, optional filename, payload).
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

//===========
// App Factory
//===========
pub fn create_test_app(config: AppConfig) -> (Router, AppState) {
    let state = AppState::new(config).expect("valid test config");
    let app = routes::create_router(&state);
    (app, state)
}

pub fn default_test_app() -> (Router, AppState) {
    create_test_app(AppConfig::default())
}

//=================
// Request Builders
//=================
pub fn build_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if file_name.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn build_upload_request(key: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/upload/{}", key))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("Failed to build multipart request")
}

//================
// Response Helpers
//================
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("body should be valid UTF-8")
}

/// `(name, contents)` for every entry, in archive order.
pub fn read_zip_entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip archive");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).expect("zip entry");
            let mut data = Vec::new();
            entry.read_to_end(&mut data).expect("read zip entry");
            (entry.name().to_string(), data)
        })
        .collect()
}

//==========
// Waiting
//==========
/// Poll until `key` reaches `status`, failing after a generous bound.
pub async fn wait_for_status(state: &AppState, key: &str, status: TransferStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.store().get(key) != Some(status) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{key} never reached {status}"));
}
