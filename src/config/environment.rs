//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::route_lifecycle::FinishPolicy;
use crate::utils::errors::{AppError, AppResult};

/// Backend de almacenamiento de rutas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Configuration(format!("STORE_BACKEND desconocido: {}", other))),
        }
    }
}

/// Parámetros de negocio del despacho de rutas
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub finish_policy: FinishPolicy,
    pub route_code_prefix: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            finish_policy: FinishPolicy::RequireDelivery,
            route_code_prefix: "RUT".to_string(),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    // Servicios externos (pedidos y datos de referencia)
    pub order_service_url: Option<String>,
    pub reference_service_url: Option<String>,
    pub external_timeout: Duration,
    pub dispatch: DispatchSettings,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            store_backend: StoreBackend::Postgres,
            database_url: None,
            order_service_url: None,
            reference_service_url: None,
            external_timeout: Duration::from_secs(10),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde variables de entorno
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| AppError::Configuration(format!("PORT inválido: {}", value)))?,
            Err(_) => defaults.port,
        };

        let external_timeout = match env::var("EXTERNAL_TIMEOUT_SECS") {
            Ok(value) => Duration::from_secs(value.parse().map_err(|_| {
                AppError::Configuration(format!("EXTERNAL_TIMEOUT_SECS inválido: {}", value))
            })?),
            Err(_) => defaults.external_timeout,
        };

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.store_backend,
        };

        let finish_policy = match env::var("FINISH_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.dispatch.finish_policy,
        };

        let config = Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port,
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| parse_list(&origins))
                .unwrap_or_default(),
            store_backend,
            database_url: env::var("DATABASE_URL").ok(),
            order_service_url: env::var("ORDER_SERVICE_URL").ok(),
            reference_service_url: env::var("REFERENCE_SERVICE_URL").ok(),
            external_timeout,
            dispatch: DispatchSettings {
                finish_policy,
                route_code_prefix: env::var("ROUTE_CODE_PREFIX")
                    .unwrap_or(defaults.dispatch.route_code_prefix),
            },
        };

        config.check()?;
        Ok(config)
    }

    /// Verificar combinaciones obligatorias
    pub fn check(&self) -> AppResult<()> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err(AppError::Configuration(
                "DATABASE_URL must be set when STORE_BACKEND=postgres".to_string(),
            ));
        }
        if self.dispatch.route_code_prefix.trim().is_empty() {
            return Err(AppError::Configuration("ROUTE_CODE_PREFIX no puede estar vacío".to_string()));
        }
        Ok(())
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let config = EnvironmentConfig::default();
        assert!(config.check().is_err());

        let config = EnvironmentConfig {
            database_url: Some("postgres://localhost/dispatch".to_string()),
            ..EnvironmentConfig::default()
        };
        assert!(config.check().is_ok());

        let config = EnvironmentConfig {
            store_backend: StoreBackend::Memory,
            ..EnvironmentConfig::default()
        };
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("http://a.test, http://b.test,,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_server_url() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.server_url(), "0.0.0.0:3000");
        assert!(config.is_development());
    }
}
