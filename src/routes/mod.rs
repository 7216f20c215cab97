//! Routes - definición del API HTTP
//!
//! Monta los routers de rutas de entrega y de datos de logística junto con
//! las capas comunes (CORS, trazas, compresión y timeout).

pub mod logistics_routes;
pub mod route_routes;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::cors_layer;
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .nest("/api/routes", route_routes::create_route_router())
        .nest("/api/logistics", logistics_routes::create_logistics_router())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
