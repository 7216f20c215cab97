//! Modelo de RouteMembership
//!
//! Inclusión de un pedido listo en una ruta, con su secuencia de entrega y
//! el resultado de la entrega. Mapea a la tabla `route_memberships`.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::order::Order;

// Escalas de las columnas NUMERIC de route_memberships
const LOAD_SCALE: u32 = 3;
const MONEY_SCALE: u32 = 2;

/// Redondear como lo hace Postgres al guardar en NUMERIC
fn to_scale(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMembership {
    /// Orden de entrega dentro de la ruta (1..N, sin huecos)
    pub sequence: i32,
    pub order_id: i64,
    pub tracking_code: String,
    pub customer_name: String,
    pub municipality: Option<String>,
    // Snapshot tomado al asignar; no cambia si el pedido se modifica después
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub order_total: Decimal,
    /// Menor número = mayor prioridad. Solo afecta el orden de despliegue.
    pub priority: i16,
    pub arrival_at: Option<DateTime<Utc>>,
    pub departure_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub delivery_notes: String,
}

impl RouteMembership {
    /// Crear la membresía a partir del pedido, congelando peso y volumen
    pub fn snapshot(order: &Order, sequence: i32, priority: i16) -> Self {
        Self {
            sequence,
            order_id: order.id,
            tracking_code: order.tracking_code.clone(),
            customer_name: order.customer_name.clone(),
            municipality: order.municipality.clone(),
            weight_kg: to_scale(order.declared_weight(), LOAD_SCALE),
            volume_m3: to_scale(order.declared_volume(), LOAD_SCALE),
            order_total: to_scale(order.total, MONEY_SCALE),
            priority,
            arrival_at: None,
            departure_at: None,
            delivered: false,
            delivered_at: None,
            receiver_name: None,
            delivery_notes: String::new(),
        }
    }

    /// Etiqueta de prioridad para el detalle de la ruta
    pub fn priority_label(&self) -> &'static str {
        match self.priority {
            1 => "Alta",
            2 | 3 => "Media",
            _ => "Normal",
        }
    }
}
