//! Clients - colaboradores externos
//!
//! Contratos con el servicio de pedidos y con los servicios de flota,
//! personal y ubicaciones. Hay una implementación HTTP para producción y una
//! en memoria para pruebas.

pub mod memory;
pub mod order_client;
pub mod reference_client;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Order, OrderFilters, OriginPoint, Person, Region, Vehicle};
use crate::utils::errors::AppResult;

pub use memory::{seed_demo_data, InMemoryOrderService, InMemoryReferenceData};
pub use order_client::HttpOrderClient;
pub use reference_client::HttpReferenceClient;

/// Servicio de pedidos
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Pedidos en estado "listo para entrega"
    async fn list_ready_orders(&self, filters: &OrderFilters) -> AppResult<Vec<Order>>;

    async fn get_order(&self, order_id: i64) -> AppResult<Option<Order>>;

    /// Marcar el pedido como asignado a una ruta
    async fn mark_assigned(&self, order_id: i64, route_id: Uuid) -> AppResult<()>;

    /// Devolver el pedido a "listo para entrega"
    async fn release(&self, order_id: i64) -> AppResult<()>;

    async fn mark_delivered(&self, order_id: i64) -> AppResult<()>;
}

/// Servicios de flota, personal y ubicaciones (solo lectura)
#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn get_vehicle(&self, vehicle_id: i64) -> AppResult<Option<Vehicle>>;

    async fn list_vehicles(&self, active_only: bool) -> AppResult<Vec<Vehicle>>;

    async fn get_person(&self, person_id: i64) -> AppResult<Option<Person>>;

    async fn list_origin_points(&self) -> AppResult<Vec<OriginPoint>>;

    async fn list_regions(&self) -> AppResult<Vec<Region>>;
}
