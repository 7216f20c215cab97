//! Modelo de Order (dato de referencia)
//!
//! Pedido leído del servicio de pedidos. El núcleo no es dueño de este dato:
//! solo lo consulta y le notifica asignaciones y liberaciones.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Estado del pedido en el servicio de pedidos
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "recibido")]
    Received,
    #[serde(rename = "confirmado")]
    Confirmed,
    #[serde(rename = "en_preparacion")]
    InPreparation,
    #[serde(rename = "listo_entrega")]
    ReadyForDelivery,
    #[serde(rename = "en_ruta")]
    OnRoute,
    #[serde(rename = "entregado")]
    Delivered,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "recibido",
            OrderStatus::Confirmed => "confirmado",
            OrderStatus::InPreparation => "en_preparacion",
            OrderStatus::ReadyForDelivery => "listo_entrega",
            OrderStatus::OnRoute => "en_ruta",
            OrderStatus::Delivered => "entregado",
            OrderStatus::Cancelled => "cancelado",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub tracking_code: String,
    pub customer_name: String,
    pub municipality: Option<String>,
    pub region_id: Option<i64>,
    pub weight_kg: Option<Decimal>,
    pub volume_m3: Option<Decimal>,
    /// Valor monetario; solo para reportes
    pub total: Decimal,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_ready(&self) -> bool {
        self.status == OrderStatus::ReadyForDelivery
    }

    /// Peso declarado; sin dato cuenta como cero
    pub fn declared_weight(&self) -> Decimal {
        self.weight_kg.unwrap_or(Decimal::ZERO)
    }

    pub fn declared_volume(&self) -> Decimal {
        self.volume_m3.unwrap_or(Decimal::ZERO)
    }
}

/// Filtros para consultar pedidos listos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilters {
    pub region_id: Option<i64>,
}
