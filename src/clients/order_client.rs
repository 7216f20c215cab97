//! Cliente HTTP del servicio de pedidos
//!
//! Traduce el API de pedidos (`/pedidos/`) al modelo `Order` del núcleo.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clients::OrderService;
use crate::models::{Order, OrderFilters, OrderStatus};
use crate::utils::errors::{AppError, AppResult};

/// Pedido tal como lo expone el servicio de pedidos
#[derive(Debug, Clone, Deserialize)]
pub struct PedidoWire {
    pub id: i64,
    pub codigo_seguimiento: String,
    pub estado: OrderStatus,
    #[serde(default)]
    pub nombres_cliente: Option<String>,
    #[serde(default)]
    pub apellidos_cliente: Option<String>,
    #[serde(default)]
    pub nombre_contacto: Option<String>,
    #[serde(default)]
    pub municipio_entrega_nombre: Option<String>,
    #[serde(default)]
    pub departamento_entrega: Option<i64>,
    #[serde(default)]
    pub peso_estimado_kg: Option<Decimal>,
    #[serde(default)]
    pub volumen_estimado_m3: Option<Decimal>,
    pub total: Decimal,
}

impl From<PedidoWire> for Order {
    fn from(wire: PedidoWire) -> Self {
        let full_name = [wire.nombres_cliente, wire.apellidos_cliente]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let customer_name = if full_name.is_empty() {
            wire.nombre_contacto.unwrap_or_default()
        } else {
            full_name
        };

        Order {
            id: wire.id,
            tracking_code: wire.codigo_seguimiento,
            customer_name,
            municipality: wire.municipio_entrega_nombre,
            region_id: wire.departamento_entrega,
            weight_kg: wire.peso_estimado_kg,
            volume_m3: wire.volumen_estimado_m3,
            total: wire.total,
            status: wire.estado,
        }
    }
}

/// Cuerpo de `cambiar-estado`
#[derive(Debug, Serialize)]
struct CambioEstadoRequest<'a> {
    nuevo_estado: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    observaciones: Option<String>,
}

/// Cliente HTTP para el servicio de pedidos
pub struct HttpOrderClient {
    client: Client,
    base_url: String,
}

impl HttpOrderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Error creando cliente de pedidos: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn change_status(&self, order_id: i64, status: OrderStatus, notes: Option<String>) -> AppResult<()> {
        let url = format!("{}/pedidos/{}/cambiar-estado/", self.base_url, order_id);
        debug!("📡 POST {} -> {}", url, status.as_str());

        let response = self
            .client
            .post(&url)
            .json(&CambioEstadoRequest {
                nuevo_estado: status.as_str(),
                observaciones: notes,
            })
            .send()
            .await
            .map_err(external)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("Order with id '{}' not found", order_id))),
            status if status.is_success() => Ok(()),
            status => Err(AppError::ExternalApi(format!(
                "cambiar-estado del pedido {} respondió {}",
                order_id, status
            ))),
        }
    }
}

fn external(e: reqwest::Error) -> AppError {
    AppError::ExternalApi(format!("Servicio de pedidos: {}", e))
}

#[async_trait]
impl OrderService for HttpOrderClient {
    async fn list_ready_orders(&self, filters: &OrderFilters) -> AppResult<Vec<Order>> {
        let url = format!("{}/pedidos/", self.base_url);
        let mut query = vec![("estado", OrderStatus::ReadyForDelivery.as_str().to_string())];
        if let Some(region_id) = filters.region_id {
            query.push(("departamento", region_id.to_string()));
        }

        let pedidos: Vec<PedidoWire> = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(external)?
            .error_for_status()
            .map_err(external)?
            .json()
            .await
            .map_err(external)?;

        info!("📦 {} pedidos listos para entrega", pedidos.len());
        Ok(pedidos.into_iter().map(Order::from).collect())
    }

    async fn get_order(&self, order_id: i64) -> AppResult<Option<Order>> {
        let url = format!("{}/pedidos/{}/", self.base_url, order_id);
        let response = self.client.get(&url).send().await.map_err(external)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let pedido: PedidoWire = response
            .error_for_status()
            .map_err(external)?
            .json()
            .await
            .map_err(external)?;
        Ok(Some(pedido.into()))
    }

    async fn mark_assigned(&self, order_id: i64, route_id: Uuid) -> AppResult<()> {
        self.change_status(order_id, OrderStatus::OnRoute, Some(format!("Asignado a la ruta {}", route_id)))
            .await
    }

    async fn release(&self, order_id: i64) -> AppResult<()> {
        self.change_status(order_id, OrderStatus::ReadyForDelivery, Some("Liberado de la ruta".to_string()))
            .await
    }

    async fn mark_delivered(&self, order_id: i64) -> AppResult<()> {
        self.change_status(order_id, OrderStatus::Delivered, None).await
    }
}
