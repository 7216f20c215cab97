use std::sync::Arc;
use uuid::Uuid;

use crate::clients::{OrderService, ReferenceData};
use crate::config::DispatchSettings;
use crate::dto::{ApiResponse, CreateRouteRequest, DeliveryRequest, RouteQuery, RouteResponse, UpdateRouteRequest};
use crate::models::{Order, OrderFilters, OriginPoint, ProgressSnapshot, Region, RouteFilter, RouteStatistics, Vehicle};
use crate::repositories::RouteStore;
use crate::services::{
    progress_aggregator, RouteAssignmentService, RouteCommand, RouteLifecycleService, RouteLocks,
    RouteStatisticsService,
};
use crate::utils::errors::{not_found_error, AppError};
use validator::Validate;

/// Fachada para el operador: una operación por caso de uso
pub struct RouteController {
    store: Arc<dyn RouteStore>,
    orders: Arc<dyn OrderService>,
    reference: Arc<dyn ReferenceData>,
    assignment: RouteAssignmentService,
    lifecycle: RouteLifecycleService,
    statistics: RouteStatisticsService,
}

impl RouteController {
    pub fn new(
        store: Arc<dyn RouteStore>,
        orders: Arc<dyn OrderService>,
        reference: Arc<dyn ReferenceData>,
        settings: &DispatchSettings,
    ) -> Self {
        // Ambos servicios comparten el mismo registro de bloqueos
        let locks = RouteLocks::new();

        Self {
            assignment: RouteAssignmentService::new(
                store.clone(),
                orders.clone(),
                reference.clone(),
                locks.clone(),
                settings.route_code_prefix.clone(),
            ),
            lifecycle: RouteLifecycleService::new(store.clone(), orders.clone(), locks, settings.finish_policy),
            statistics: RouteStatisticsService::new(store.clone(), orders.clone(), reference.clone()),
            store,
            orders,
            reference,
        }
    }

    pub async fn list(&self, query: RouteQuery) -> Result<Vec<RouteResponse>, AppError> {
        let status = match query.state.as_deref().map(str::trim) {
            Some(state) if !state.is_empty() => Some(state.parse()?),
            _ => None,
        };

        let routes = self
            .store
            .list(&RouteFilter {
                status,
                region_id: query.region,
            })
            .await?;
        Ok(routes.into_iter().map(RouteResponse::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<RouteResponse, AppError> {
        let route = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| not_found_error("Route", id))?;
        Ok(route.into())
    }

    pub async fn progress(&self, id: Uuid) -> Result<ProgressSnapshot, AppError> {
        let route = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| not_found_error("Route", id))?;
        Ok(progress_aggregator::snapshot(&route))
    }

    pub async fn create(&self, request: CreateRouteRequest) -> Result<ApiResponse<RouteResponse>, AppError> {
        let route = self.assignment.create_route(request).await?;
        let message = format!("Ruta {} creada exitosamente", route.code);
        Ok(ApiResponse::success_with_message(route.into(), message))
    }

    pub async fn update(&self, id: Uuid, request: UpdateRouteRequest) -> Result<ApiResponse<RouteResponse>, AppError> {
        let route = self.assignment.update_route(id, request).await?;
        let message = format!("Ruta {} actualizada exitosamente", route.code);
        Ok(ApiResponse::success_with_message(route.into(), message))
    }

    pub async fn delete(&self, id: Uuid) -> Result<ApiResponse<()>, AppError> {
        let route = self.assignment.delete_route(id).await?;
        Ok(ApiResponse::message(format!("Ruta {} eliminada exitosamente", route.code)))
    }

    pub async fn command(&self, id: Uuid, command: RouteCommand) -> Result<ApiResponse<RouteResponse>, AppError> {
        let route = self.lifecycle.execute(id, command).await?;
        let message = format!("Ruta {}: {}", route.code, route.status.label());
        Ok(ApiResponse::success_with_message(route.into(), message))
    }

    pub async fn confirm(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::Confirm).await
    }

    pub async fn start(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::Start).await
    }

    pub async fn dispatch(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::Dispatch).await
    }

    pub async fn begin_delivery(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::BeginDelivery).await
    }

    pub async fn finish(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::Finish).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ApiResponse<RouteResponse>, AppError> {
        self.command(id, RouteCommand::Cancel).await
    }

    pub async fn record_arrival(&self, id: Uuid, order_id: i64) -> Result<ApiResponse<RouteResponse>, AppError> {
        let route = self.lifecycle.record_arrival(id, order_id).await?;
        Ok(ApiResponse::success_with_message(
            route.into(),
            format!("Llegada registrada para el pedido {}", order_id),
        ))
    }

    pub async fn record_delivery(
        &self,
        id: Uuid,
        order_id: i64,
        request: DeliveryRequest,
    ) -> Result<ApiResponse<RouteResponse>, AppError> {
        request.validate()?;
        let route = self
            .lifecycle
            .record_delivery(id, order_id, &request.receiver_name, request.notes)
            .await?;
        Ok(ApiResponse::success_with_message(
            route.into(),
            format!("Pedido {} entregado", order_id),
        ))
    }

    pub async fn statistics(&self, region_id: Option<i64>) -> Result<RouteStatistics, AppError> {
        self.statistics.statistics(region_id).await
    }

    pub async fn ready_orders(&self, filters: OrderFilters) -> Result<Vec<Order>, AppError> {
        self.orders.list_ready_orders(&filters).await
    }

    pub async fn vehicles(&self, active_only: bool) -> Result<Vec<Vehicle>, AppError> {
        self.reference.list_vehicles(active_only).await
    }

    pub async fn origin_points(&self) -> Result<Vec<OriginPoint>, AppError> {
        self.reference.list_origin_points().await
    }

    pub async fn regions(&self) -> Result<Vec<Region>, AppError> {
        self.reference.list_regions().await
    }
}
