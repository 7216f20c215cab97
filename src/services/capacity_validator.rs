//! Validador de capacidad
//!
//! Suma el peso y el volumen declarados de un conjunto de pedidos y confirma
//! que no superan los límites del vehículo. Función pura, sin efectos.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::models::{Order, RouteMembership, Vehicle};
use crate::utils::errors::{AppError, AppResult};

/// Dimensión de capacidad verificada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityDimension {
    Weight,
    Volume,
}

impl CapacityDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityDimension::Weight => "weight",
            CapacityDimension::Volume => "volume",
        }
    }
}

impl fmt::Display for CapacityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algo que declara una carga (pedido o membresía ya congelada)
pub trait DeclaredLoad {
    fn weight_kg(&self) -> Decimal;
    fn volume_m3(&self) -> Decimal;
}

impl DeclaredLoad for Order {
    fn weight_kg(&self) -> Decimal {
        self.declared_weight()
    }

    fn volume_m3(&self) -> Decimal {
        self.declared_volume()
    }
}

impl DeclaredLoad for RouteMembership {
    fn weight_kg(&self) -> Decimal {
        self.weight_kg
    }

    fn volume_m3(&self) -> Decimal {
        self.volume_m3
    }
}

/// Carga total de un conjunto de pedidos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CargoLoad {
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
}

impl CargoLoad {
    pub fn of<T: DeclaredLoad>(items: &[T]) -> Self {
        items.iter().fold(CargoLoad::default(), |acc, item| CargoLoad {
            weight_kg: acc.weight_kg + item.weight_kg(),
            volume_m3: acc.volume_m3 + item.volume_m3(),
        })
    }
}

/// Verificar que la carga cabe en el vehículo.
///
/// El peso se verifica siempre; el volumen solo si el vehículo declara un
/// límite. Falla con la primera dimensión excedida (peso antes que volumen).
pub fn validate<T: DeclaredLoad>(vehicle: &Vehicle, items: &[T]) -> AppResult<CargoLoad> {
    let load = CargoLoad::of(items);

    if load.weight_kg > vehicle.weight_capacity_kg {
        return Err(AppError::CapacityExceeded {
            dimension: CapacityDimension::Weight,
            declared: load.weight_kg,
            limit: vehicle.weight_capacity_kg,
        });
    }

    if let Some(limit) = vehicle.volume_capacity_m3 {
        if load.volume_m3 > limit {
            return Err(AppError::CapacityExceeded {
                dimension: CapacityDimension::Volume,
                declared: load.volume_m3,
                limit,
            });
        }
    }

    Ok(load)
}
