//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y los parámetros de negocio del despacho.

pub mod database;
pub mod environment;

pub use environment::*;
