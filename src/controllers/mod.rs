//! Controllers - fachada entre los handlers HTTP y los servicios

pub mod route_controller;

pub use route_controller::RouteController;
