//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validar los campos que llegan
//! en las solicitudes de rutas antes de tocar el almacenamiento.

use chrono::NaiveDate;
use num_traits::Zero;
use std::collections::HashSet;
use std::fmt::Display;

use crate::utils::errors::{validation_error, AppResult};

/// Prioridad más alta permitida (1 = alta)
pub const MIN_PRIORITY: i16 = 1;
/// Prioridad por defecto de un pedido dentro de la ruta
pub const DEFAULT_PRIORITY: i16 = 5;

/// Validar que un string no esté vacío
pub fn validate_not_blank(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(validation_error(format!("El campo '{}' es obligatorio", field)));
    }
    Ok(())
}

/// Validar que un campo requerido venga presente
pub fn require<T>(field: &str, value: Option<T>) -> AppResult<T> {
    value.ok_or_else(|| validation_error(format!("El campo '{}' es obligatorio", field)))
}

/// Validar que la fecha planificada no sea anterior a la fecha de referencia
pub fn validate_planned_date(planned: NaiveDate, reference: NaiveDate) -> AppResult<()> {
    if planned < reference {
        return Err(validation_error(format!(
            "La fecha planificada {} no puede ser anterior a {}",
            planned, reference
        )));
    }
    Ok(())
}

/// Validar que un valor sea no negativo
pub fn validate_non_negative<T: PartialOrd + Display + Zero>(field: &str, value: T) -> AppResult<()> {
    if value < T::zero() {
        return Err(validation_error(format!(
            "El campo '{}' no puede ser negativo ({})",
            field, value
        )));
    }
    Ok(())
}

/// Validar que la lista de pedidos no esté vacía ni tenga duplicados
pub fn validate_order_ids(order_ids: &[i64]) -> AppResult<()> {
    if order_ids.is_empty() {
        return Err(validation_error("Debes seleccionar al menos un pedido"));
    }

    let mut seen = HashSet::with_capacity(order_ids.len());
    for id in order_ids {
        if !seen.insert(*id) {
            return Err(validation_error(format!("El pedido {} aparece más de una vez", id)));
        }
    }
    Ok(())
}

/// Validar rango de prioridad (1 = alta, 5 = normal)
pub fn validate_priority(order_id: i64, priority: i16) -> AppResult<()> {
    if !(MIN_PRIORITY..=DEFAULT_PRIORITY).contains(&priority) {
        return Err(validation_error(format!(
            "Prioridad inválida para el pedido {}: {} (rango {}-{})",
            order_id, priority, MIN_PRIORITY, DEFAULT_PRIORITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("name", "Ruta Norte").is_ok());
        assert!(validate_not_blank("name", "   ").is_err());
    }

    #[test]
    fn test_validate_planned_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(validate_planned_date(today, today).is_ok());
        assert!(validate_planned_date(today.succ_opt().unwrap(), today).is_ok());
        assert!(validate_planned_date(today.pred_opt().unwrap(), today).is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative("km", Decimal::new(125, 1)).is_ok());
        assert!(validate_non_negative("km", Decimal::ZERO).is_ok());
        assert!(validate_non_negative("km", Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_validate_order_ids() {
        assert!(validate_order_ids(&[1, 2, 3]).is_ok());
        assert!(validate_order_ids(&[]).is_err());
        assert!(validate_order_ids(&[4, 5, 4]).is_err());
    }

    #[test]
    fn test_validate_priority() {
        assert!(validate_priority(1, 1).is_ok());
        assert!(validate_priority(1, 5).is_ok());
        assert!(validate_priority(1, 0).is_err());
        assert!(validate_priority(1, 6).is_err());
    }

    #[test]
    fn test_require() {
        assert_eq!(require("region_id", Some(3)).unwrap(), 3);
        assert!(require::<i64>("region_id", None).is_err());
    }
}
