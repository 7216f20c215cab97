//! Route Store en memoria
//!
//! Mismo contrato que el repositorio PostgreSQL. La unicidad de pedido entre
//! rutas activas se comprueba bajo el mismo cerrojo de escritura que inserta,
//! así dos altas concurrentes nunca comparten un pedido.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ActiveMembership, Route, RouteFilter};
use crate::repositories::RouteStore;
use crate::utils::errors::{AppError, AppResult};

#[derive(Clone, Default)]
pub struct InMemoryRouteStore {
    routes: Arc<RwLock<HashMap<Uuid, Route>>>,
    code_sequence: Arc<AtomicI64>,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }
}

/// Primer pedido de `route` que ya es miembro de otra ruta no terminal
fn conflicting_order(routes: &HashMap<Uuid, Route>, route: &Route) -> Option<(i64, String)> {
    if route.status.is_terminal() {
        return None;
    }
    route.memberships.iter().find_map(|membership| {
        routes
            .values()
            .filter(|other| other.id != route.id && !other.status.is_terminal())
            .find(|other| other.membership(membership.order_id).is_some())
            .map(|other| (membership.order_id, other.code.clone()))
    })
}

fn unavailable(order_id: i64, route_code: String) -> AppError {
    AppError::OrderUnavailable {
        order_id: Some(order_id),
        reason: format!("El pedido ya pertenece a la ruta activa {}", route_code),
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn list(&self, filter: &RouteFilter) -> AppResult<Vec<Route>> {
        let routes = self.routes.read().await;
        let mut matching: Vec<Route> = routes.values().filter(|r| filter.matches(r)).cloned().collect();
        matching.sort_by(|a, b| {
            b.planned_date
                .cmp(&a.planned_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(matching)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Route>> {
        Ok(self.routes.read().await.get(&id).cloned())
    }

    async fn next_code_sequence(&self) -> AppResult<i64> {
        Ok(self.code_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert(&self, route: &Route) -> AppResult<()> {
        let mut routes = self.routes.write().await;
        if routes.values().any(|r| r.id == route.id || r.code == route.code) {
            return Err(AppError::Internal(format!("Ruta duplicada: {}", route.code)));
        }
        if let Some((order_id, code)) = conflicting_order(&routes, route) {
            return Err(unavailable(order_id, code));
        }
        routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn save(&self, route: &Route) -> AppResult<()> {
        let mut routes = self.routes.write().await;
        if !routes.contains_key(&route.id) {
            return Err(AppError::NotFound(format!("Route with id '{}' not found", route.id)));
        }
        if let Some((order_id, code)) = conflicting_order(&routes, route) {
            return Err(unavailable(order_id, code));
        }
        routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.routes.write().await.remove(&id).is_some())
    }

    async fn find_active_memberships(&self, order_ids: &[i64]) -> AppResult<Vec<ActiveMembership>> {
        let routes = self.routes.read().await;
        let mut active = Vec::new();
        for route in routes.values().filter(|r| !r.status.is_terminal()) {
            for membership in route.memberships.iter().filter(|m| order_ids.contains(&m.order_id)) {
                active.push(ActiveMembership {
                    order_id: membership.order_id,
                    route_id: route.id,
                    route_code: route.code.clone(),
                });
            }
        }
        Ok(active)
    }

    async fn count_deliveries_on(&self, date: NaiveDate, region_id: Option<i64>) -> AppResult<i64> {
        let routes = self.routes.read().await;
        let count = routes
            .values()
            .filter(|r| region_id.map_or(true, |region| r.region_id == region))
            .flat_map(|r| r.memberships.iter())
            .filter(|m| m.delivered && m.delivered_at.map(|at| at.date_naive()) == Some(date))
            .count();
        Ok(count as i64)
    }

    async fn vehicles_in_use(&self) -> AppResult<Vec<i64>> {
        let routes = self.routes.read().await;
        let mut vehicles: Vec<i64> = routes
            .values()
            .filter(|r| r.status.is_underway())
            .filter_map(|r| r.vehicle_id)
            .collect();
        vehicles.sort_unstable();
        vehicles.dedup();
        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Order, OrderStatus, RouteMembership, RouteStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn order(id: i64) -> Order {
        Order {
            id,
            tracking_code: format!("PED-{}", id),
            customer_name: "Cliente".to_string(),
            municipality: None,
            region_id: Some(1),
            weight_kg: Some(Decimal::from(10)),
            volume_m3: None,
            total: Decimal::from(100),
            status: OrderStatus::ReadyForDelivery,
        }
    }

    fn route(code: &str, order_ids: &[i64]) -> Route {
        let now = Utc::now();
        Route {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: "Ruta".to_string(),
            region_id: 1,
            vehicle_id: Some(7),
            technician_id: 1,
            operator_id: None,
            origin_point_id: None,
            planned_date: now.date_naive(),
            actual_start: None,
            actual_end: None,
            status: RouteStatus::Planned,
            tags: BTreeSet::new(),
            notes: String::new(),
            estimated_km: None,
            total_weight_kg: Decimal::ZERO,
            total_volume_m3: Decimal::ZERO,
            total_orders: order_ids.len() as i32,
            delivered_orders: 0,
            memberships: order_ids
                .iter()
                .enumerate()
                .map(|(i, id)| RouteMembership::snapshot(&order(*id), i as i32 + 1, 5))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_order_in_active_route() {
        let store = InMemoryRouteStore::new();
        store.insert(&route("RUT-1", &[1, 2])).await.unwrap();

        let err = store.insert(&route("RUT-2", &[2, 3])).await.unwrap_err();
        assert!(matches!(err, AppError::OrderUnavailable { order_id: Some(2), .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_terminal_route_frees_orders() {
        let store = InMemoryRouteStore::new();
        let mut first = route("RUT-1", &[1]);
        store.insert(&first).await.unwrap();

        first.status = RouteStatus::Cancelled;
        store.save(&first).await.unwrap();

        store.insert(&route("RUT-2", &[1])).await.unwrap();
        let active = store.find_active_memberships(&[1]).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].route_code, "RUT-2");
    }

    #[tokio::test]
    async fn test_code_sequence_increments() {
        let store = InMemoryRouteStore::new();
        assert_eq!(store.next_code_sequence().await.unwrap(), 1);
        assert_eq!(store.next_code_sequence().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_deliveries_and_vehicles_in_use() {
        let store = InMemoryRouteStore::new();
        let mut r = route("RUT-1", &[1, 2]);
        let delivered_at = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        r.status = RouteStatus::Delivering;
        r.memberships[0].delivered = true;
        r.memberships[0].delivered_at = Some(delivered_at);
        store.insert(&r).await.unwrap();

        let day = delivered_at.date_naive();
        assert_eq!(store.count_deliveries_on(day, None).await.unwrap(), 1);
        assert_eq!(store.count_deliveries_on(day, Some(99)).await.unwrap(), 0);
        assert_eq!(store.vehicles_in_use().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_save_unknown_route_is_not_found() {
        let store = InMemoryRouteStore::new();
        let err = store.save(&route("RUT-9", &[1])).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
