//! Tile request handlers.
//!
//! Both the path form (`/tiles/{style}/{z}/{x}/{y}`) and the query form
//! (`/tiles/{style}?x=&y=&z=`) funnel into the same dispatch: resolve the
//! tile address, check a map out of the pool, render, release, respond.

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::Response,
};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use tile_common::{envelope_for, resolve, TileError, TileScheme};

use crate::render::TileFormat;
use crate::state::AppState;

// ============================================================================
// Handlers
// ============================================================================

/// GET /tiles/{style}/{z}/{x}/{y}
///
/// The coordinate segments arrive as strings so the resolver owns all
/// validation, including the optional `.png` suffix on the last segment.
pub async fn tile_path_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((style, z, x, y)): Path<(String, String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let address = format!("{}/{}/{}", z, x, y);
    serve_tile(&state, &style, Some(&address), &params).await
}

/// GET /tiles/{style}?x=&y=&z=
pub async fn tile_query_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(style): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    serve_tile(&state, &style, None, &params).await
}

// ============================================================================
// Dispatch
// ============================================================================

async fn serve_tile(
    state: &AppState,
    style: &str,
    address: Option<&str>,
    params: &HashMap<String, String>,
) -> Response {
    counter!("tile_requests_total").increment(1);

    let scheme = requested_scheme(params, state.config.default_scheme);

    let coord = match resolve(
        address,
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        scheme,
    ) {
        Ok(coord) => coord,
        Err(e) => {
            counter!("tile_requests_rejected_total").increment(1);
            return plain_error(e.http_status_code(), &e.to_string());
        }
    };
    let envelope = envelope_for(&coord);

    let map = match state.pool.acquire(style).await {
        Ok(map) => map,
        Err(e) => {
            counter!("map_acquire_failures_total").increment(1);
            warn!(style, error = %e, "failed to acquire map");
            return plain_error(e.http_status_code(), &e.to_string());
        }
    };

    let started = Instant::now();
    let rendered = state
        .renderer
        .render(&map, &envelope, TileFormat::Png)
        .await;

    // The guard hands the map back to the pool on drop, whether rendering
    // succeeded, failed, or this future was cancelled by a disconnect.
    drop(map);

    match rendered {
        Ok(bytes) => {
            counter!("tiles_rendered_total").increment(1);
            histogram!("tile_render_seconds").record(started.elapsed().as_secs_f64());
            info!(
                style,
                z = coord.z,
                x = coord.x,
                y = coord.y,
                bytes = bytes.len(),
                "rendered tile"
            );
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, TileFormat::Png.content_type())
                .body(Body::from(bytes))
                .unwrap_or_else(|e| {
                    let err = TileError::Internal(e.to_string());
                    plain_error(err.http_status_code(), &err.to_string())
                })
        }
        Err(e) => {
            counter!("tile_render_failures_total").increment(1);
            let err = TileError::RenderFailed(e.to_string());
            warn!(style, error = %err, "tile rendering failed");
            plain_error(err.http_status_code(), &err.to_string())
        }
    }
}

/// `tms=true` (or `1`) flips the row axis for this request.
fn requested_scheme(params: &HashMap<String, String>, default: TileScheme) -> TileScheme {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("tms"))
        .map(|(_, v)| {
            if matches!(v.to_ascii_lowercase().as_str(), "1" | "true") {
                TileScheme::Tms
            } else {
                TileScheme::Xyz
            }
        })
        .unwrap_or(default)
}

fn plain_error(status: u16, message: &str) -> Response {
    let status =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(message.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_scheme_flag() {
        let mut params = HashMap::new();
        assert_eq!(requested_scheme(&params, TileScheme::Xyz), TileScheme::Xyz);
        assert_eq!(requested_scheme(&params, TileScheme::Tms), TileScheme::Tms);

        params.insert("tms".to_string(), "true".to_string());
        assert_eq!(requested_scheme(&params, TileScheme::Xyz), TileScheme::Tms);

        params.insert("tms".to_string(), "false".to_string());
        assert_eq!(requested_scheme(&params, TileScheme::Tms), TileScheme::Xyz);
    }

    #[test]
    fn test_requested_scheme_case_insensitive() {
        let mut params = HashMap::new();
        params.insert("TMS".to_string(), "1".to_string());
        assert_eq!(requested_scheme(&params, TileScheme::Xyz), TileScheme::Tms);
    }
}
