//! Health and metrics endpoints.

use axum::{extract::Extension, response::Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tile-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}
