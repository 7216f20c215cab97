use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::dto::VehicleQuery;
use crate::models::{Order, OrderFilters, OriginPoint, Region, Vehicle};
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Datos de referencia para la consola del operador (solo lectura)
pub fn create_logistics_router() -> Router<AppState> {
    Router::new()
        .route("/ready-orders", get(ready_orders))
        .route("/vehicles", get(list_vehicles))
        .route("/origin-points", get(list_origin_points))
        .route("/regions", get(list_regions))
}

async fn ready_orders(
    State(state): State<AppState>,
    Query(filters): Query<OrderFilters>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.routes.ready_orders(filters).await?))
}

async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleQuery>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    Ok(Json(state.routes.vehicles(query.active_only).await?))
}

async fn list_origin_points(State(state): State<AppState>) -> Result<Json<Vec<OriginPoint>>, AppError> {
    Ok(Json(state.routes.origin_points().await?))
}

async fn list_regions(State(state): State<AppState>) -> Result<Json<Vec<Region>>, AppError> {
    Ok(Json(state.routes.regions().await?))
}
