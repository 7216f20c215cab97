//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::capacity_validator::CapacityDimension;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("Capacity exceeded on {dimension}: declared {declared}, limit {limit}")]
    CapacityExceeded {
        dimension: CapacityDimension,
        declared: Decimal,
        limit: Decimal,
    },

    #[error("Order unavailable: {reason}")]
    OrderUnavailable { order_id: Option<i64>, reason: String },

    #[error("Invalid transition from {from} on {command}: {reason}")]
    InvalidTransition {
        from: String,
        command: String,
        reason: String,
    },

    #[error("Route already started (state {state})")]
    AlreadyStarted { state: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl AppError {
    /// Código estable que viaja en el cuerpo de la respuesta
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::OrderUnavailable { .. } => "ORDER_UNAVAILABLE",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::AlreadyStarted { .. } => "ALREADY_STARTED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Database(_) | AppError::Migration(_) => "DB_ERROR",
            AppError::ExternalApi(_) => "EXTERNAL_API_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::CapacityExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OrderUnavailable { .. }
            | AppError::InvalidTransition { .. }
            | AppError::AlreadyStarted { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = Some(self.code().to_string());

        let error_response = match self {
            AppError::Validation(msg) => {
                warn!("⚠️ Validation error: {}", msg);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::InvalidInput(e) => {
                warn!("⚠️ Invalid input: {}", e);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }

            AppError::CapacityExceeded { dimension, declared, limit } => {
                warn!("⚠️ Capacity exceeded ({}): {} > {}", dimension, declared, limit);
                ErrorResponse {
                    error: "Capacity Exceeded".to_string(),
                    message: format!(
                        "La carga declarada de {} ({}) supera el límite del vehículo ({})",
                        dimension, declared, limit
                    ),
                    details: Some(json!({
                        "dimension": dimension.as_str(),
                        "declared": declared,
                        "limit": limit,
                    })),
                    code,
                }
            }

            AppError::OrderUnavailable { order_id, reason } => {
                warn!("⚠️ Order unavailable {:?}: {}", order_id, reason);
                ErrorResponse {
                    error: "Order Unavailable".to_string(),
                    message: reason,
                    details: order_id.map(|id| json!({ "order_id": id })),
                    code,
                }
            }

            AppError::InvalidTransition { from, command, reason } => {
                warn!("⚠️ Invalid transition {} -> {}: {}", from, command, reason);
                ErrorResponse {
                    error: "Invalid Transition".to_string(),
                    message: reason,
                    details: Some(json!({ "from": from, "command": command })),
                    code,
                }
            }

            AppError::AlreadyStarted { state } => {
                warn!("⚠️ Route already started, state {}", state);
                ErrorResponse {
                    error: "Already Started".to_string(),
                    message: format!("La ruta ya fue iniciada (estado {})", state),
                    details: Some(json!({ "state": state })),
                    code,
                }
            }

            AppError::NotFound(msg) => {
                warn!("⚠️ Resource not found: {}", msg);
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::Database(e) => {
                error!("❌ Database error: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: Some(json!({ "sql_error": e.to_string() })),
                    code,
                }
            }

            AppError::Migration(e) => {
                error!("❌ Migration error: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while migrating the database".to_string(),
                    details: None,
                    code,
                }
            }

            AppError::ExternalApi(msg) => {
                error!("❌ External API error: {}", msg);
                ErrorResponse {
                    error: "External API Error".to_string(),
                    message: "An error occurred while communicating with external service".to_string(),
                    details: Some(json!({ "external_api_error": msg })),
                    code,
                }
            }

            AppError::Configuration(msg) | AppError::Internal(msg) => {
                error!("❌ Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: Some(json!({ "internal_error": msg })),
                    code,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para pedidos que no pueden entrar a una ruta
pub fn order_unavailable(order_id: i64, reason: impl Into<String>) -> AppError {
    AppError::OrderUnavailable {
        order_id: Some(order_id),
        reason: reason.into(),
    }
}
