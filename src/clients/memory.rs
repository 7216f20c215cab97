//! Colaboradores en memoria
//!
//! Implementaciones de `OrderService` y `ReferenceData` respaldadas por mapas
//! en memoria. Se usan en pruebas y en desarrollo local.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clients::{OrderService, ReferenceData};
use crate::models::{Order, OrderFilters, OrderStatus, OriginPoint, Person, Region, Vehicle};
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Servicio de pedidos en memoria
#[derive(Clone, Default)]
pub struct InMemoryOrderService {
    orders: Arc<RwLock<BTreeMap<i64, Order>>>,
    assignments: Arc<RwLock<BTreeMap<i64, Uuid>>>,
    failing: Arc<RwLock<HashSet<i64>>>,
}

impl InMemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    pub async fn status_of(&self, order_id: i64) -> Option<OrderStatus> {
        self.orders.read().await.get(&order_id).map(|o| o.status)
    }

    pub async fn assigned_route(&self, order_id: i64) -> Option<Uuid> {
        self.assignments.read().await.get(&order_id).copied()
    }

    /// Hacer que `mark_assigned` falle para este pedido
    pub async fn fail_assignment_of(&self, order_id: i64) {
        self.failing.write().await.insert(order_id);
    }

    async fn set_status(&self, order_id: i64, status: OrderStatus) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| not_found_error("Order", order_id))?;
        order.status = status;
        Ok(())
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn list_ready_orders(&self, filters: &OrderFilters) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.is_ready())
            .filter(|o| filters.region_id.map_or(true, |region| o.region_id == Some(region)))
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: i64) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn mark_assigned(&self, order_id: i64, route_id: Uuid) -> AppResult<()> {
        if self.failing.read().await.contains(&order_id) {
            return Err(AppError::ExternalApi(format!(
                "Servicio de pedidos no disponible para el pedido {}",
                order_id
            )));
        }
        self.set_status(order_id, OrderStatus::OnRoute).await?;
        self.assignments.write().await.insert(order_id, route_id);
        Ok(())
    }

    async fn release(&self, order_id: i64) -> AppResult<()> {
        self.set_status(order_id, OrderStatus::ReadyForDelivery).await?;
        self.assignments.write().await.remove(&order_id);
        Ok(())
    }

    async fn mark_delivered(&self, order_id: i64) -> AppResult<()> {
        self.set_status(order_id, OrderStatus::Delivered).await?;
        self.assignments.write().await.remove(&order_id);
        Ok(())
    }
}

/// Catálogos de referencia en memoria
#[derive(Clone, Default)]
pub struct InMemoryReferenceData {
    vehicles: Arc<RwLock<BTreeMap<i64, Vehicle>>>,
    people: Arc<RwLock<BTreeMap<i64, Person>>>,
    origin_points: Arc<RwLock<BTreeMap<i64, OriginPoint>>>,
    regions: Arc<RwLock<BTreeMap<i64, Region>>>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.write().await.insert(vehicle.id, vehicle);
    }

    pub async fn insert_person(&self, person: Person) {
        self.people.write().await.insert(person.id, person);
    }

    pub async fn insert_origin_point(&self, point: OriginPoint) {
        self.origin_points.write().await.insert(point.id, point);
    }

    pub async fn insert_region(&self, region: Region) {
        self.regions.write().await.insert(region.id, region);
    }
}

#[async_trait]
impl ReferenceData for InMemoryReferenceData {
    async fn get_vehicle(&self, vehicle_id: i64) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&vehicle_id).cloned())
    }

    async fn list_vehicles(&self, active_only: bool) -> AppResult<Vec<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| !active_only || v.active)
            .cloned()
            .collect())
    }

    async fn get_person(&self, person_id: i64) -> AppResult<Option<Person>> {
        Ok(self.people.read().await.get(&person_id).cloned())
    }

    async fn list_origin_points(&self) -> AppResult<Vec<OriginPoint>> {
        Ok(self.origin_points.read().await.values().cloned().collect())
    }

    async fn list_regions(&self) -> AppResult<Vec<Region>> {
        Ok(self.regions.read().await.values().cloned().collect())
    }
}

/// Datos de demostración para levantar el servicio sin colaboradores externos
pub async fn seed_demo_data(orders: &InMemoryOrderService, reference: &InMemoryReferenceData) {
    use crate::models::VehicleCategory;
    use rust_decimal::Decimal;

    reference
        .insert_region(Region {
            id: 16,
            name: "Alta Verapaz".to_string(),
        })
        .await;
    reference
        .insert_origin_point(OriginPoint {
            id: 1,
            name: "Bodega Cobán".to_string(),
            region_id: Some(16),
            municipality: Some("Cobán".to_string()),
            active: true,
        })
        .await;
    reference
        .insert_person(Person {
            id: 1,
            full_name: "Técnico de campo".to_string(),
            email: None,
            roles: vec!["tecnico".to_string()],
            active: true,
        })
        .await;
    reference
        .insert_vehicle(Vehicle {
            id: 1,
            license_plate: "C-123ABC".to_string(),
            category: VehicleCategory::Pickup,
            brand: Some("Toyota".to_string()),
            model: Some("Hilux".to_string()),
            weight_capacity_kg: Decimal::from(1000),
            volume_capacity_m3: Some(Decimal::from(4)),
            length_m: None,
            width_m: None,
            height_m: None,
            active: true,
        })
        .await;

    for id in 1..=5 {
        orders
            .insert(Order {
                id,
                tracking_code: format!("PED-DEMO-{:04}", id),
                customer_name: format!("Cliente {}", id),
                municipality: Some("Cobán".to_string()),
                region_id: Some(16),
                weight_kg: Some(Decimal::from(50 * id)),
                volume_m3: Some(Decimal::new(5 * id, 1)),
                total: Decimal::from(250 * id),
                status: OrderStatus::ReadyForDelivery,
            })
            .await;
    }
}
