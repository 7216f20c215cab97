//! Services module
//!
//! Este módulo contiene la lógica de negocio de rutas de entrega: validación
//! de capacidad, motor de asignación, máquina de estados, agregación de
//! progreso e indicadores.

pub mod capacity_validator;
pub mod progress_aggregator;
pub mod route_assignment;
pub mod route_lifecycle;
pub mod route_locks;
pub mod route_statistics;

pub use route_assignment::RouteAssignmentService;
pub use route_lifecycle::{FinishPolicy, RouteCommand, RouteLifecycleService};
pub use route_locks::RouteLocks;
pub use route_statistics::RouteStatisticsService;
