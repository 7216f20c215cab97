//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::clients::{OrderService, ReferenceData};
use crate::config::environment::EnvironmentConfig;
use crate::controllers::route_controller::RouteController;
use crate::repositories::RouteStore;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub routes: Arc<RouteController>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn RouteStore>,
        orders: Arc<dyn OrderService>,
        reference: Arc<dyn ReferenceData>,
    ) -> Self {
        let routes = RouteController::new(store, orders, reference, &config.dispatch);
        Self {
            config,
            routes: Arc::new(routes),
        }
    }
}
