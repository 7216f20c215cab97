//! Instantánea de progreso de una ruta

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total_weight_kg: Decimal,
    pub total_volume_m3: Decimal,
    pub total_orders: i32,
    pub delivered_orders: i32,
    pub percent_complete: f64,
}

/// Indicadores del tablero de logística
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteStatistics {
    pub active_routes: usize,
    pub unassigned_orders: usize,
    pub deliveries_completed_today: i64,
    pub vehicles_available: usize,
    pub vehicles_total: usize,
}
