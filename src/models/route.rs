//! Modelo de Route
//!
//! Este módulo contiene la ruta de entrega, su estado operativo y las
//! etiquetas informativas. Mapea a la tabla `routes` de PostgreSQL.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::membership::RouteMembership;
use crate::utils::errors::{validation_error, AppError};

/// Estado de la ruta - mapea al ENUM route_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    Assigned,
    InProgress,
    InTransit,
    Delivering,
    Completed,
    Cancelled,
}

impl RouteStatus {
    pub const ALL: [RouteStatus; 7] = [
        RouteStatus::Planned,
        RouteStatus::Assigned,
        RouteStatus::InProgress,
        RouteStatus::InTransit,
        RouteStatus::Delivering,
        RouteStatus::Completed,
        RouteStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Planned => "planned",
            RouteStatus::Assigned => "assigned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::InTransit => "in_transit",
            RouteStatus::Delivering => "delivering",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        }
    }

    /// Etiqueta legible para el tablero
    pub fn label(&self) -> &'static str {
        match self {
            RouteStatus::Planned => "Planificada",
            RouteStatus::Assigned => "Asignada",
            RouteStatus::InProgress => "En Progreso",
            RouteStatus::InTransit => "En Tránsito",
            RouteStatus::Delivering => "Entregando",
            RouteStatus::Completed => "Completada",
            RouteStatus::Cancelled => "Cancelada",
        }
    }

    /// Agrupación usada por el tablero: los tres estados en curso se muestran juntos
    pub fn display_bucket(&self) -> &'static str {
        match self {
            RouteStatus::Planned | RouteStatus::Assigned => "pending",
            RouteStatus::InProgress | RouteStatus::InTransit | RouteStatus::Delivering => "active",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteStatus::Completed | RouteStatus::Cancelled)
    }

    /// La ruta ya salió y está en operación
    pub fn is_underway(&self) -> bool {
        matches!(
            self,
            RouteStatus::InProgress | RouteStatus::InTransit | RouteStatus::Delivering
        )
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RouteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| validation_error(format!("Estado de ruta desconocido: {}", value)))
    }
}

/// Etiquetas informativas de una ruta. No disparan reglas de negocio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RouteTag {
    /// Camino de terracería
    Terraceria,
    Lluvia,
    Fragil,
    Prioritario,
}

impl RouteTag {
    pub const ALLOWED: [RouteTag; 4] = [
        RouteTag::Terraceria,
        RouteTag::Lluvia,
        RouteTag::Fragil,
        RouteTag::Prioritario,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTag::Terraceria => "terraceria",
            RouteTag::Lluvia => "lluvia",
            RouteTag::Fragil => "fragil",
            RouteTag::Prioritario => "prioritario",
        }
    }

    /// Convertir la lista libre del cliente al conjunto validado
    pub fn parse_set<S: AsRef<str>>(values: &[S]) -> Result<BTreeSet<RouteTag>, AppError> {
        values.iter().map(|value| value.as_ref().parse()).collect()
    }
}

impl FromStr for RouteTag {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        RouteTag::ALLOWED
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| {
                validation_error(format!(
                    "Etiqueta no permitida: '{}' (permitidas: terraceria, lluvia, fragil, prioritario)",
                    value
                ))
            })
    }
}

/// Ruta de entrega con sus pedidos asignados
#[derive(Debug, Clone, Serialize)]
pub struct Route {
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
    pub tags: BTreeSet<RouteTag>,
    pub notes: String,
    pub estimated_km: Option<Decimal>,
    // Totales derivados, recalculados en cada mutación
    pub total_weight_kg: Decimal,
    pub total_volume_m3: Decimal,
    pub total_orders: i32,
    pub delivered_orders: i32,
    pub memberships: Vec<RouteMembership>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn order_ids(&self) -> Vec<i64> {
        self.memberships.iter().map(|m| m.order_id).collect()
    }

    pub fn membership(&self, order_id: i64) -> Option<&RouteMembership> {
        self.memberships.iter().find(|m| m.order_id == order_id)
    }

    pub fn membership_mut(&mut self, order_id: i64) -> Option<&mut RouteMembership> {
        self.memberships.iter_mut().find(|m| m.order_id == order_id)
    }

    /// Pedidos que no llegaron a entregarse
    pub fn undelivered_order_ids(&self) -> Vec<i64> {
        self.memberships
            .iter()
            .filter(|m| !m.delivered)
            .map(|m| m.order_id)
            .collect()
    }

    /// Misma versión guardada: mismo estado y misma marca de actualización.
    /// Postgres guarda microsegundos, así que se compara a esa precisión.
    pub fn is_same_revision(&self, other: &Route) -> bool {
        self.status == other.status
            && self.updated_at.trunc_subsecs(6) == other.updated_at.trunc_subsecs(6)
    }

    /// Renumerar la secuencia de entrega 1..N en el orden actual
    pub fn resequence(&mut self) {
        for (index, membership) in self.memberships.iter_mut().enumerate() {
            membership.sequence = index as i32 + 1;
        }
    }
}

/// Filtros para listar rutas
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub status: Option<RouteStatus>,
    pub region_id: Option<i64>,
}

impl RouteFilter {
    pub fn matches(&self, route: &Route) -> bool {
        self.status.map_or(true, |status| route.status == status)
            && self.region_id.map_or(true, |region| route.region_id == region)
    }
}

/// Pedido que ya ocupa una ruta no terminal
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ActiveMembership {
    pub order_id: i64,
    pub route_id: Uuid,
    pub route_code: String,
}
