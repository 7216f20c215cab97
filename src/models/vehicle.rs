//! Modelo de Vehicle (dato de referencia)
//!
//! Vehículo leído del servicio de flota. Las capacidades declaradas son
//! techos duros para el validador de capacidad.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tipo de vehículo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Truck,
    Pickup,
    Van,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub license_plate: String,
    pub category: VehicleCategory,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub weight_capacity_kg: Decimal,
    /// Sin límite de volumen declarado se omite esa verificación
    pub volume_capacity_m3: Option<Decimal>,
    pub length_m: Option<Decimal>,
    pub width_m: Option<Decimal>,
    pub height_m: Option<Decimal>,
    pub active: bool,
}

impl Vehicle {
    /// Dimensiones en texto, p. ej. "4.2 x 2.0 x 2.1 m"
    pub fn dimensions_label(&self) -> Option<String> {
        match (self.length_m, self.width_m, self.height_m) {
            (Some(l), Some(w), Some(h)) => Some(format!("{} x {} x {} m", l, w, h)),
            _ => None,
        }
    }
}
