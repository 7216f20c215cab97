//! DTOs - objetos de entrada y salida del API HTTP

pub mod route_dto;

pub use route_dto::*;
