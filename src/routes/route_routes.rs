use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::dto::{
    ApiResponse, CreateRouteRequest, DeliveryRequest, RouteQuery, RouteResponse, StatisticsQuery, UpdateRouteRequest,
};
use crate::models::{ProgressSnapshot, RouteStatistics};
use crate::services::RouteCommand;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_routes).post(create_route))
        .route("/statistics", get(route_statistics))
        .route("/:id", get(get_route).patch(update_route).delete(delete_route))
        .route("/:id/progress", get(route_progress))
        .route("/:id/confirm", post(confirm_route))
        .route("/:id/start", post(start_route))
        .route("/:id/dispatch", post(dispatch_route))
        .route("/:id/begin-delivery", post(begin_delivery))
        .route("/:id/finish", post(finish_route))
        .route("/:id/cancel", post(cancel_route))
        .route("/:id/orders/:order_id/arrival", post(record_arrival))
        .route("/:id/orders/:order_id/delivery", post(record_delivery))
}

type RouteResult = Result<Json<ApiResponse<RouteResponse>>, AppError>;

async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    Ok(Json(state.routes.list(query).await?))
}

async fn create_route(State(state): State<AppState>, Json(request): Json<CreateRouteRequest>) -> RouteResult {
    Ok(Json(state.routes.create(request).await?))
}

async fn route_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<RouteStatistics>, AppError> {
    Ok(Json(state.routes.statistics(query.region).await?))
}

async fn get_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RouteResponse>, AppError> {
    Ok(Json(state.routes.get(id).await?))
}

async fn route_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    Ok(Json(state.routes.progress(id).await?))
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> RouteResult {
    Ok(Json(state.routes.update(id, request).await?))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    Ok(Json(state.routes.delete(id).await?))
}

async fn run_command(state: AppState, id: Uuid, command: RouteCommand) -> RouteResult {
    Ok(Json(state.routes.command(id, command).await?))
}

async fn confirm_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::Confirm).await
}

async fn start_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::Start).await
}

async fn dispatch_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::Dispatch).await
}

async fn begin_delivery(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::BeginDelivery).await
}

async fn finish_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::Finish).await
}

async fn cancel_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> RouteResult {
    run_command(state, id, RouteCommand::Cancel).await
}

async fn record_arrival(State(state): State<AppState>, Path((id, order_id)): Path<(Uuid, i64)>) -> RouteResult {
    Ok(Json(state.routes.record_arrival(id, order_id).await?))
}

async fn record_delivery(
    State(state): State<AppState>,
    Path((id, order_id)): Path<(Uuid, i64)>,
    Json(request): Json<DeliveryRequest>,
) -> RouteResult {
    Ok(Json(state.routes.record_delivery(id, order_id, request).await?))
}
