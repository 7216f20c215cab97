//! Modelos del sistema
//!
//! Este módulo contiene la ruta de entrega, sus membresías y los datos de
//! referencia que el núcleo consulta a servicios externos.

pub mod membership;
pub mod order;
pub mod progress;
pub mod reference;
pub mod route;
pub mod vehicle;

pub use membership::RouteMembership;
pub use order::{Order, OrderFilters, OrderStatus};
pub use progress::{ProgressSnapshot, RouteStatistics};
pub use reference::{OriginPoint, Person, Region};
pub use route::{ActiveMembership, Route, RouteFilter, RouteStatus, RouteTag};
pub use vehicle::{Vehicle, VehicleCategory};
