//! Repositories - acceso a datos
//!
//! `RouteStore` es el sistema de registro de rutas y membresías. Es el único
//! componente con autoridad de escritura sobre ese estado.

pub mod memory_route_repository;
pub mod route_repository;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{ActiveMembership, Route, RouteFilter};
use crate::utils::errors::AppResult;

pub use memory_route_repository::InMemoryRouteStore;
pub use route_repository::PgRouteRepository;

#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn list(&self, filter: &RouteFilter) -> AppResult<Vec<Route>>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Route>>;

    /// Siguiente valor para el código de ruta
    async fn next_code_sequence(&self) -> AppResult<i64>;

    /// Insertar ruta y membresías en un solo paso.
    ///
    /// Falla con `OrderUnavailable` si algún pedido ya es miembro activo de
    /// otra ruta.
    async fn insert(&self, route: &Route) -> AppResult<()>;

    /// Reemplazar la ruta y su conjunto de membresías
    async fn save(&self, route: &Route) -> AppResult<()>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Membresías activas (rutas no terminales) de los pedidos indicados
    async fn find_active_memberships(&self, order_ids: &[i64]) -> AppResult<Vec<ActiveMembership>>;

    /// Entregas registradas en un día (UTC), opcionalmente por región
    async fn count_deliveries_on(&self, date: NaiveDate, region_id: Option<i64>) -> AppResult<i64>;

    /// Vehículos ocupados por rutas en operación
    async fn vehicles_in_use(&self) -> AppResult<Vec<i64>>;
}
