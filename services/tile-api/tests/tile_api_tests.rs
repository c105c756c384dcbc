//! Integration tests driving the router directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use tempfile::TempDir;
use tower::util::ServiceExt;

use tile_api::render::{RenderError, TileFormat, TileRenderer};
use tile_api::style::MapSource;
use tile_api::{app, AppState, ServerConfig};
use tile_common::BoundingBox;

const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

fn styles_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("osm.yaml"),
        "name: OSM\nbackground: \"#336699\"\n",
    )
    .unwrap();
    dir
}

fn test_state(dir: &TempDir) -> Arc<AppState> {
    let config = ServerConfig {
        styles_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    Arc::new(AppState::new(config))
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Option<String>, Bytes) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, body)
}

#[tokio::test]
async fn test_tile_by_path() {
    let dir = styles_dir();
    let (status, content_type, body) = get(test_state(&dir), "/tiles/osm/3/2/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(&body[..8], &PNG_MAGIC);
}

#[tokio::test]
async fn test_tile_by_path_with_extension() {
    let dir = styles_dir();
    let (status, _, body) = get(test_state(&dir), "/tiles/osm/3/2/1.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..8], &PNG_MAGIC);
}

#[tokio::test]
async fn test_tile_by_query() {
    let dir = styles_dir();
    let (status, content_type, body) =
        get(test_state(&dir), "/tiles/osm?x=2&y=1&z=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(&body[..8], &PNG_MAGIC);
}

#[tokio::test]
async fn test_missing_query_parameter_rejected() {
    let dir = styles_dir();
    let (status, _, body) = get(test_state(&dir), "/tiles/osm?x=2&z=3").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("'y'"));
}

#[tokio::test]
async fn test_non_integer_coordinate_rejected() {
    let dir = styles_dir();
    let (status, _, _) = get(test_state(&dir), "/tiles/osm/3/2/abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_grid_coordinate_rejected() {
    let dir = styles_dir();
    // Zoom 1 only has columns/rows 0..2.
    let (status, _, _) = get(test_state(&dir), "/tiles/osm/1/0/5").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tms_flag_accepted() {
    let dir = styles_dir();
    let (status, _, body) = get(test_state(&dir), "/tiles/osm/3/2/1?tms=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..8], &PNG_MAGIC);
}

#[tokio::test]
async fn test_unknown_style_is_server_error() {
    let dir = styles_dir();
    let (status, _, _) = get(test_state(&dir), "/tiles/nope/3/2/1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_draining_pool_returns_unavailable() {
    let dir = styles_dir();
    let state = test_state(&dir);
    state.pool.drain().await;

    let (status, _, _) = get(Arc::clone(&state), "/tiles/osm/3/2/1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health() {
    let dir = styles_dir();
    let (status, content_type, body) = get(test_state(&dir), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.as_deref().unwrap().starts_with("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

struct FailingRenderer;

#[async_trait]
impl TileRenderer for FailingRenderer {
    async fn render(
        &self,
        _map: &MapSource,
        _envelope: &BoundingBox,
        _format: TileFormat,
    ) -> Result<Bytes, RenderError> {
        Err(RenderError::Failed("no backend".to_string()))
    }
}

struct StallingRenderer;

#[async_trait]
impl TileRenderer for StallingRenderer {
    async fn render(
        &self,
        _map: &MapSource,
        _envelope: &BoundingBox,
        _format: TileFormat,
    ) -> Result<Bytes, RenderError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(RenderError::Failed("never reached".to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnected_client_returns_the_map() {
    let dir = styles_dir();
    let config = ServerConfig {
        styles_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::with_renderer(config, Arc::new(StallingRenderer)));

    // A request stuck mid-render, abandoned the way a closed connection
    // abandons its handler future.
    let request = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let _ = app(state)
                .oneshot(
                    Request::builder()
                        .uri("/tiles/osm/3/2/1")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await;
        })
    };

    for _ in 0..500 {
        if state.pool.status("osm").map(|s| s.checked_out) == Some(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(state.pool.status("osm").unwrap().checked_out, 1);

    request.abort();
    let _ = request.await;

    // The map came back to the pool, and shutdown is not wedged.
    let status = state.pool.status("osm").unwrap();
    assert_eq!(status.checked_out, 0);
    assert_eq!(status.idle, 1);
    tokio::time::timeout(Duration::from_millis(500), state.pool.drain())
        .await
        .expect("drain hung after an abandoned request");
}

#[tokio::test]
async fn test_render_failure_releases_the_map() {
    let dir = styles_dir();
    let config = ServerConfig {
        styles_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::with_renderer(config, Arc::new(FailingRenderer)));

    let (status, _, _) = get(Arc::clone(&state), "/tiles/osm/3/2/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The map must be back in the pool despite the failure.
    let status = state.pool.status("osm").unwrap();
    assert_eq!(status.checked_out, 0);
    assert_eq!(status.idle, 1);
}
