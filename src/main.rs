use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use dotenvy::dotenv;

use delivery_dispatch::clients::{
    seed_demo_data, HttpOrderClient, HttpReferenceClient, InMemoryOrderService, InMemoryReferenceData,
    OrderService, ReferenceData,
};
use delivery_dispatch::config::database::DatabaseConfig;
use delivery_dispatch::config::{EnvironmentConfig, StoreBackend};
use delivery_dispatch::database::DatabaseConnection;
use delivery_dispatch::repositories::{InMemoryRouteStore, PgRouteRepository, RouteStore};
use delivery_dispatch::utils::errors::AppError;
use delivery_dispatch::{create_app_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚚 Delivery Dispatch - rutas de entrega");
    info!("========================================");

    let config = EnvironmentConfig::from_env()?;
    info!(
        "⚙️ Entorno: {} | almacenamiento: {:?} | cierre: {:?}",
        config.environment, config.store_backend, config.dispatch.finish_policy
    );

    let store = build_store(&config).await?;
    let (orders, reference) = build_collaborators(&config).await?;

    let addr: SocketAddr = config.server_url().parse()?;
    let app = create_app_router(AppState::new(config, store, orders, reference));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /health");
    info!("🚚 Rutas de entrega:");
    info!("   GET    /api/routes?state=&region=");
    info!("   POST   /api/routes");
    info!("   GET    /api/routes/statistics?region=");
    info!("   GET    /api/routes/:id  |  PATCH /api/routes/:id  |  DELETE /api/routes/:id");
    info!("   GET    /api/routes/:id/progress");
    info!("   POST   /api/routes/:id/confirm|start|dispatch|begin-delivery|finish|cancel");
    info!("   POST   /api/routes/:id/orders/:order_id/arrival|delivery");
    info!("📦 Logística:");
    info!("   GET    /api/logistics/ready-orders|vehicles|origin-points|regions");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

async fn build_store(config: &EnvironmentConfig) -> Result<Arc<dyn RouteStore>, AppError> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .clone()
                .ok_or_else(|| AppError::Configuration("DATABASE_URL no definido".to_string()))?;
            let connection = DatabaseConnection::connect(&DatabaseConfig::new(url)).await?;
            Ok(Arc::new(PgRouteRepository::new(connection.pool().clone())))
        }
        StoreBackend::Memory => {
            warn!("⚠️ Usando almacenamiento en memoria: las rutas se pierden al reiniciar");
            Ok(Arc::new(InMemoryRouteStore::new()))
        }
    }
}

async fn build_collaborators(
    config: &EnvironmentConfig,
) -> Result<(Arc<dyn OrderService>, Arc<dyn ReferenceData>), AppError> {
    let fixtures_allowed = config.store_backend == StoreBackend::Memory;
    let missing = |name: &str| {
        AppError::Configuration(format!("{} es obligatorio con STORE_BACKEND=postgres", name))
    };

    let demo_orders = InMemoryOrderService::new();
    let demo_reference = InMemoryReferenceData::new();
    let mut uses_fixtures = false;

    let orders: Arc<dyn OrderService> = match &config.order_service_url {
        Some(url) => Arc::new(HttpOrderClient::new(url.clone(), config.external_timeout)?),
        None if fixtures_allowed => {
            uses_fixtures = true;
            Arc::new(demo_orders.clone())
        }
        None => return Err(missing("ORDER_SERVICE_URL")),
    };

    let reference: Arc<dyn ReferenceData> = match &config.reference_service_url {
        Some(url) => Arc::new(HttpReferenceClient::new(url.clone(), config.external_timeout)?),
        None if fixtures_allowed => {
            uses_fixtures = true;
            Arc::new(demo_reference.clone())
        }
        None => return Err(missing("REFERENCE_SERVICE_URL")),
    };

    if uses_fixtures {
        warn!("⚠️ Servicios externos no configurados: usando datos de demostración");
        seed_demo_data(&demo_orders, &demo_reference).await;
    }

    Ok((orders, reference))
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo escuchar SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
