use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;
use validator::Validate;

use crate::models::{ProgressSnapshot, Route, RouteMembership, RouteStatus, RouteTag};
use crate::services::progress_aggregator;

/// Distingue "campo ausente" de "campo en null" en un PATCH
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Request para crear una ruta
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRouteRequest {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: String,
    pub technician_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub planned_date: Option<NaiveDate>,
    pub region_id: Option<i64>,
    pub origin_point_id: Option<i64>,
    pub estimated_km: Option<Decimal>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Pedidos en el orden de entrega elegido por el operador
    #[serde(default)]
    pub order_ids: Vec<i64>,
    /// Prioridad por pedido (1 = alta ... 5 = normal)
    #[serde(default)]
    pub priorities: HashMap<i64, i16>,
}

// Request para actualizar una ruta (PATCH)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRouteRequest {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: Option<String>,
    pub technician_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub vehicle_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub operator_id: Option<Option<i64>>,
    pub planned_date: Option<NaiveDate>,
    pub region_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub origin_point_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub estimated_km: Option<Option<Decimal>>,
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Reemplaza el conjunto de pedidos; los que se quitan se liberan
    pub order_ids: Option<Vec<i64>>,
    pub priorities: Option<HashMap<i64, i16>>,
}

impl UpdateRouteRequest {
    /// Solo trae notas (permitido en cualquier estado)
    pub fn is_notes_only(&self) -> bool {
        self.notes.is_some()
            && self.name.is_none()
            && self.technician_id.is_none()
            && self.vehicle_id.is_none()
            && self.operator_id.is_none()
            && self.planned_date.is_none()
            && self.region_id.is_none()
            && self.origin_point_id.is_none()
            && self.estimated_km.is_none()
            && self.tags.is_none()
            && self.order_ids.is_none()
            && self.priorities.is_none()
    }

    pub fn touches_membership(&self) -> bool {
        self.order_ids.is_some() || self.priorities.is_some()
    }
}

// Query de listado: ?state=&region=
#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    pub state: Option<String>,
    pub region: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub region: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VehicleQuery {
    #[serde(default)]
    pub active_only: bool,
}

// Request para registrar una entrega
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeliveryRequest {
    #[validate(length(min = 1, max = 200, message = "El nombre de quien recibe es obligatorio"))]
    pub receiver_name: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

// Pedido dentro de la respuesta de ruta
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub sequence: i32,
    pub order_id: i64,
    pub tracking_code: String,
    pub customer_name: String,
    pub municipality: Option<String>,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub order_total: Decimal,
    pub priority: i16,
    pub priority_label: &'static str,
    pub arrival_at: Option<DateTime<Utc>>,
    pub departure_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub delivery_notes: String,
}

impl From<RouteMembership> for MembershipResponse {
    fn from(membership: RouteMembership) -> Self {
        let priority_label = membership.priority_label();
        Self {
            sequence: membership.sequence,
            order_id: membership.order_id,
            tracking_code: membership.tracking_code,
            customer_name: membership.customer_name,
            municipality: membership.municipality,
            weight_kg: membership.weight_kg,
            volume_m3: membership.volume_m3,
            order_total: membership.order_total,
            priority: membership.priority,
            priority_label,
            arrival_at: membership.arrival_at,
            departure_at: membership.departure_at,
            delivered: membership.delivered,
            delivered_at: membership.delivered_at,
            receiver_name: membership.receiver_name,
            delivery_notes: membership.delivery_notes,
        }
    }
}

// Response de ruta con su progreso
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub region_id: i64,
    pub vehicle_id: Option<i64>,
    pub technician_id: i64,
    pub operator_id: Option<i64>,
    pub origin_point_id: Option<i64>,
    pub planned_date: NaiveDate,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: RouteStatus,
    pub status_label: &'static str,
    pub display_bucket: &'static str,
    pub tags: BTreeSet<RouteTag>,
    pub notes: String,
    pub estimated_km: Option<Decimal>,
    pub order_value: Decimal,
    pub progress: ProgressSnapshot,
    pub orders: Vec<MembershipResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        // El progreso se deriva siempre de las membresías actuales
        let progress = progress_aggregator::snapshot(&route);
        let order_value = route.memberships.iter().map(|m| m.order_total).sum();

        Self {
            id: route.id,
            code: route.code,
            name: route.name,
            region_id: route.region_id,
            vehicle_id: route.vehicle_id,
            technician_id: route.technician_id,
            operator_id: route.operator_id,
            origin_point_id: route.origin_point_id,
            planned_date: route.planned_date,
            actual_start: route.actual_start,
            actual_end: route.actual_end,
            status: route.status,
            status_label: route.status.label(),
            display_bucket: route.status.display_bucket(),
            tags: route.tags,
            notes: route.notes,
            estimated_km: route.estimated_km,
            order_value,
            progress,
            orders: route.memberships.into_iter().map(MembershipResponse::from).collect(),
            created_at: route.created_at,
            updated_at: route.updated_at,
        }
    }
}

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: UpdateRouteRequest = serde_json::from_value(json!({
            "vehicle_id": null,
            "notes": "Camino cerrado en km 12"
        }))
        .unwrap();

        assert_eq!(patch.vehicle_id, Some(None));
        assert_eq!(patch.operator_id, None);
        assert!(!patch.is_notes_only());
    }

    #[test]
    fn test_notes_only_patch() {
        let patch: UpdateRouteRequest = serde_json::from_value(json!({ "notes": "Cliente pidió llamar antes" })).unwrap();
        assert!(patch.is_notes_only());
        assert!(!patch.touches_membership());
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateRouteRequest = serde_json::from_value(json!({
            "name": "Ruta Alta Verapaz",
            "technician_id": 4,
            "region_id": 16,
            "planned_date": "2030-01-15",
            "order_ids": [10, 11],
            "priorities": { "11": 1 }
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        assert!(request.tags.is_empty());
        assert_eq!(request.priorities.get(&11), Some(&1));
    }

    #[test]
    fn test_blank_name_fails_validation() {
        let request: CreateRouteRequest = serde_json::from_value(json!({ "name": "" })).unwrap();
        assert!(request.validate().is_err());
    }
}
