//! Despacho de rutas de entrega
//!
//! Agrupa pedidos listos en rutas, valida la capacidad del vehículo y lleva
//! cada ruta por su ciclo operativo desde la planificación hasta el cierre.

pub mod clients;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_app_router;
pub use state::AppState;
