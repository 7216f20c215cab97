//! Datos de referencia de personal y ubicaciones
//!
//! Catálogos de solo lectura provistos por servicios externos.

use serde::{Deserialize, Serialize};

/// Persona que puede quedar a cargo de una ruta (técnico u operador)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub active: bool,
}

/// Punto de origen declarado de una ruta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginPoint {
    pub id: i64,
    pub name: String,
    pub region_id: Option<i64>,
    pub municipality: Option<String>,
    pub active: bool,
}

/// Región/departamento al que se asigna una ruta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
}
