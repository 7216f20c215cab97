//! Indicadores del tablero de logística

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::clients::{OrderService, ReferenceData};
use crate::models::{OrderFilters, RouteFilter, RouteStatistics};
use crate::repositories::RouteStore;
use crate::utils::errors::AppResult;

pub struct RouteStatisticsService {
    store: Arc<dyn RouteStore>,
    orders: Arc<dyn OrderService>,
    reference: Arc<dyn ReferenceData>,
}

impl RouteStatisticsService {
    pub fn new(store: Arc<dyn RouteStore>, orders: Arc<dyn OrderService>, reference: Arc<dyn ReferenceData>) -> Self {
        Self {
            store,
            orders,
            reference,
        }
    }

    pub async fn statistics(&self, region_id: Option<i64>) -> AppResult<RouteStatistics> {
        let routes = self
            .store
            .list(&RouteFilter {
                status: None,
                region_id,
            })
            .await?;
        let active_routes = routes.iter().filter(|r| !r.status.is_terminal()).count();

        let ready = self.orders.list_ready_orders(&OrderFilters { region_id }).await?;
        let ready_ids: Vec<i64> = ready.iter().map(|o| o.id).collect();
        let assigned: HashSet<i64> = self
            .store
            .find_active_memberships(&ready_ids)
            .await?
            .into_iter()
            .map(|m| m.order_id)
            .collect();
        let unassigned_orders = ready_ids.iter().filter(|id| !assigned.contains(id)).count();

        let today = Utc::now().date_naive();
        let deliveries_completed_today = self.store.count_deliveries_on(today, region_id).await?;

        let in_use: HashSet<i64> = self.store.vehicles_in_use().await?.into_iter().collect();
        let vehicles_available = self
            .reference
            .list_vehicles(true)
            .await?
            .iter()
            .filter(|v| !in_use.contains(&v.id))
            .count();
        let vehicles_total = self.reference.list_vehicles(false).await?.len();

        debug!(
            "📊 Estadísticas región {:?}: {} rutas activas, {} pedidos sin asignar",
            region_id, active_routes, unassigned_orders
        );

        Ok(RouteStatistics {
            active_routes,
            unassigned_orders,
            deliveries_completed_today,
            vehicles_available,
            vehicles_total,
        })
    }
}
