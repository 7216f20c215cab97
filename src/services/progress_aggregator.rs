//! Agregador de progreso
//!
//! Deriva los totales de la ruta (peso, volumen, pedidos entregados y
//! porcentaje de avance) a partir de las membresías actuales. Se recalcula
//! siempre desde cero; no hay estado incremental.

use rust_decimal::Decimal;

use crate::models::{ProgressSnapshot, Route, RouteMembership};

/// Calcular la instantánea de progreso de un conjunto de membresías
pub fn snapshot_of(memberships: &[RouteMembership]) -> ProgressSnapshot {
    let total_orders = memberships.len() as i32;
    let delivered_orders = memberships.iter().filter(|m| m.delivered).count() as i32;

    let total_weight_kg = memberships
        .iter()
        .fold(Decimal::ZERO, |acc, m| acc + m.weight_kg);
    let total_volume_m3 = memberships
        .iter()
        .fold(Decimal::ZERO, |acc, m| acc + m.volume_m3);

    let percent_complete = if total_orders == 0 {
        0.0
    } else {
        delivered_orders as f64 / total_orders as f64 * 100.0
    };

    ProgressSnapshot {
        total_weight_kg,
        total_volume_m3,
        total_orders,
        delivered_orders,
        percent_complete,
    }
}

/// Instantánea de progreso de una ruta
pub fn snapshot(route: &Route) -> ProgressSnapshot {
    snapshot_of(&route.memberships)
}

/// Copiar los totales derivados a los campos cacheados de la ruta
pub fn refresh_totals(route: &mut Route) -> ProgressSnapshot {
    let progress = snapshot(route);
    route.total_weight_kg = progress.total_weight_kg;
    route.total_volume_m3 = progress.total_volume_m3;
    route.total_orders = progress.total_orders;
    route.delivered_orders = progress.delivered_orders;
    progress
}
