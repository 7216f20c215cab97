#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use delivery_dispatch::clients::{InMemoryOrderService, InMemoryReferenceData, OrderService};
use delivery_dispatch::dto::CreateRouteRequest;
use delivery_dispatch::models::{Order, OrderStatus, OriginPoint, Person, Region, Vehicle, VehicleCategory};
use delivery_dispatch::repositories::InMemoryRouteStore;
use delivery_dispatch::services::{FinishPolicy, RouteAssignmentService, RouteLifecycleService, RouteLocks};

pub const REGION_ID: i64 = 16;
pub const TECHNICIAN_ID: i64 = 1;
pub const ORIGIN_POINT_ID: i64 = 3;
pub const SMALL_TRUCK: i64 = 10;
pub const PICKUP: i64 = 11;

pub struct Harness {
    pub store: Arc<InMemoryRouteStore>,
    pub orders: InMemoryOrderService,
    pub reference: InMemoryReferenceData,
    pub assignment: Arc<RouteAssignmentService>,
    pub lifecycle: Arc<RouteLifecycleService>,
    pub locks: RouteLocks,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(FinishPolicy::RequireDelivery).await
    }

    pub async fn with_policy(policy: FinishPolicy) -> Self {
        Self::with_order_service(policy, |orders| Arc::new(orders) as Arc<dyn OrderService>).await
    }

    /// Los servicios ven el servicio de pedidos que devuelva `wrap`; el
    /// harness conserva el servicio en memoria para consultar estados.
    pub async fn with_order_service<F>(policy: FinishPolicy, wrap: F) -> Self
    where
        F: FnOnce(InMemoryOrderService) -> Arc<dyn OrderService>,
    {
        let store = Arc::new(InMemoryRouteStore::new());
        let orders = InMemoryOrderService::new();
        let reference = InMemoryReferenceData::new();
        seed_reference(&reference).await;

        let order_service = wrap(orders.clone());
        let locks = RouteLocks::new();
        let assignment = RouteAssignmentService::new(
            store.clone(),
            order_service.clone(),
            Arc::new(reference.clone()),
            locks.clone(),
            "RUT",
        );
        let lifecycle = RouteLifecycleService::new(store.clone(), order_service, locks.clone(), policy);

        Self {
            store,
            orders,
            reference,
            assignment: Arc::new(assignment),
            lifecycle: Arc::new(lifecycle),
            locks,
        }
    }

    /// Registrar pedidos listos con el peso indicado (ids consecutivos desde `first_id`)
    pub async fn ready_orders(&self, first_id: i64, weights: &[i64]) -> Vec<i64> {
        let mut ids = Vec::new();
        for (offset, weight) in weights.iter().enumerate() {
            let id = first_id + offset as i64;
            self.orders.insert(ready_order(id, *weight)).await;
            ids.push(id);
        }
        ids
    }
}

pub fn ready_order(id: i64, weight_kg: i64) -> Order {
    Order {
        id,
        tracking_code: format!("PED-{:05}", id),
        customer_name: format!("Cliente {}", id),
        municipality: Some("Cobán".to_string()),
        region_id: Some(REGION_ID),
        weight_kg: Some(Decimal::from(weight_kg)),
        volume_m3: Some(Decimal::new(5, 1)),
        total: Decimal::from(150),
        status: OrderStatus::ReadyForDelivery,
    }
}

pub fn vehicle(id: i64, weight_capacity_kg: i64) -> Vehicle {
    Vehicle {
        id,
        license_plate: format!("C-{:03}AAA", id),
        category: VehicleCategory::Truck,
        brand: Some("Isuzu".to_string()),
        model: Some("NPR".to_string()),
        weight_capacity_kg: Decimal::from(weight_capacity_kg),
        volume_capacity_m3: None,
        length_m: None,
        width_m: None,
        height_m: None,
        active: true,
    }
}

async fn seed_reference(reference: &InMemoryReferenceData) {
    reference
        .insert_region(Region {
            id: REGION_ID,
            name: "Alta Verapaz".to_string(),
        })
        .await;
    reference
        .insert_person(Person {
            id: TECHNICIAN_ID,
            full_name: "María Xol".to_string(),
            email: Some("maria.xol@example.com".to_string()),
            roles: vec!["tecnico".to_string()],
            active: true,
        })
        .await;
    reference
        .insert_origin_point(OriginPoint {
            id: ORIGIN_POINT_ID,
            name: "Bodega Cobán".to_string(),
            region_id: Some(REGION_ID),
            municipality: Some("Cobán".to_string()),
            active: true,
        })
        .await;
    reference.insert_vehicle(vehicle(SMALL_TRUCK, 500)).await;
    reference.insert_vehicle(vehicle(PICKUP, 1000)).await;
}

pub fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}

pub fn create_request(order_ids: &[i64], vehicle_id: Option<i64>) -> CreateRouteRequest {
    CreateRouteRequest {
        name: "Ruta Cobán norte".to_string(),
        technician_id: Some(TECHNICIAN_ID),
        vehicle_id,
        operator_id: None,
        planned_date: Some(tomorrow()),
        region_id: Some(REGION_ID),
        origin_point_id: Some(ORIGIN_POINT_ID),
        estimated_km: Some(Decimal::new(425, 1)),
        tags: vec!["terraceria".to_string()],
        notes: None,
        order_ids: order_ids.to_vec(),
        priorities: HashMap::new(),
    }
}
