//! Configuración de conexión a PostgreSQL
//!
//! Este módulo abre el pool de conexiones y aplica las migraciones embebidas
//! del esquema de rutas.

use sqlx::PgPool;
use tracing::info;

use crate::config::database::DatabaseConfig;
use crate::utils::errors::AppResult;

/// Conexión a la base de datos con su pool
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar y aplicar migraciones pendientes
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        info!("🗄️ Conectando a la base de datos {}", mask_database_url(&config.url));
        let pool = config.create_pool().await?;

        run_migrations(&pool).await?;
        info!("✅ Base de datos lista");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Ejecutar migraciones de la base de datos
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Función helper para enmascarar la URL de la base de datos en logs
fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.find('@')) {
        (Some(scheme_end), Some(at_pos)) if scheme_end < at_pos => {
            format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}
