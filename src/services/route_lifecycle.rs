//! Máquina de estados de la ruta
//!
//! Gobierna las transiciones legales entre estados operativos y los efectos
//! que cada transición dispara (marcas de tiempo, liberación de pedidos).
//!
//! ```text
//! planned ─confirm─► assigned
//!    │                  │
//!    └──────start───────┴─► in_progress ─dispatch─► in_transit ─begin_delivery─► delivering
//!                               └────────────┴──────finish────────────┴──────────► completed
//! cualquier estado no terminal ──cancel──► cancelled
//! ```

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::OrderService;
use crate::models::{Route, RouteStatus};
use crate::repositories::RouteStore;
use crate::services::progress_aggregator;
use crate::services::route_locks::RouteLocks;
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};

/// Comandos del operador que mueven el estado de una ruta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCommand {
    Confirm,
    Start,
    Dispatch,
    BeginDelivery,
    Finish,
    Cancel,
}

impl RouteCommand {
    pub const ALL: [RouteCommand; 6] = [
        RouteCommand::Confirm,
        RouteCommand::Start,
        RouteCommand::Dispatch,
        RouteCommand::BeginDelivery,
        RouteCommand::Finish,
        RouteCommand::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteCommand::Confirm => "confirm",
            RouteCommand::Start => "start",
            RouteCommand::Dispatch => "dispatch",
            RouteCommand::BeginDelivery => "begin_delivery",
            RouteCommand::Finish => "finish",
            RouteCommand::Cancel => "cancel",
        }
    }
}

impl fmt::Display for RouteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Política para cerrar una ruta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishPolicy {
    /// Exige al menos un pedido entregado
    RequireDelivery,
    /// Permite cerrar aunque todas las entregas hayan fallado
    Unconditional,
}

impl FromStr for FinishPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "require_delivery" => Ok(FinishPolicy::RequireDelivery),
            "unconditional" => Ok(FinishPolicy::Unconditional),
            other => Err(AppError::Configuration(format!("FINISH_POLICY desconocida: {}", other))),
        }
    }
}

fn invalid(from: RouteStatus, command: impl fmt::Display, reason: impl Into<String>) -> AppError {
    AppError::InvalidTransition {
        from: from.as_str().to_string(),
        command: command.to_string(),
        reason: reason.into(),
    }
}

/// Tabla de transiciones. Todo par no listado falla.
pub fn next_status(from: RouteStatus, command: RouteCommand) -> AppResult<RouteStatus> {
    use RouteCommand::*;
    use RouteStatus::*;

    match (from, command) {
        (Planned, Confirm) => Ok(Assigned),
        (Planned | Assigned, Start) => Ok(InProgress),
        (_, Start) => Err(AppError::AlreadyStarted {
            state: from.as_str().to_string(),
        }),
        (InProgress, Dispatch) => Ok(InTransit),
        (InTransit, BeginDelivery) => Ok(Delivering),
        (InProgress | InTransit | Delivering, Finish) => Ok(Completed),
        (status, Cancel) if !status.is_terminal() => Ok(Cancelled),
        (status, _) if status.is_terminal() => Err(invalid(
            from,
            command,
            format!("La ruta está en estado terminal ({})", status.label()),
        )),
        _ => Err(invalid(
            from,
            command,
            format!("No se puede aplicar '{}' a una ruta {}", command, from.label()),
        )),
    }
}

/// Resultado de aplicar un comando
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub from: RouteStatus,
    pub to: RouteStatus,
    /// Pedidos que deben volver a "listo para entrega"
    pub released_orders: Vec<i64>,
}

/// Aplicar un comando sobre la ruta: guardas, estado y efectos locales
pub fn apply(
    route: &mut Route,
    command: RouteCommand,
    policy: FinishPolicy,
    now: DateTime<Utc>,
) -> AppResult<TransitionOutcome> {
    let from = route.status;
    let to = next_status(from, command)?;

    if from == RouteStatus::Planned && route.memberships.is_empty() {
        return Err(invalid(from, command, "La ruta no tiene pedidos asignados"));
    }

    match command {
        RouteCommand::Confirm | RouteCommand::Start => {
            if route.vehicle_id.is_none() {
                return Err(invalid(from, command, "La ruta no tiene vehículo asignado"));
            }
            if route.memberships.is_empty() {
                return Err(invalid(from, command, "La ruta no tiene pedidos asignados"));
            }
        }
        RouteCommand::Finish => {
            if policy == FinishPolicy::RequireDelivery && !route.memberships.iter().any(|m| m.delivered) {
                return Err(invalid(
                    from,
                    command,
                    "Debe haber al menos un pedido entregado para finalizar la ruta",
                ));
            }
        }
        RouteCommand::Dispatch | RouteCommand::BeginDelivery | RouteCommand::Cancel => {}
    }

    let released_orders = match command {
        RouteCommand::Start => {
            route.actual_start = Some(now);
            Vec::new()
        }
        RouteCommand::Finish => {
            route.actual_end = Some(now);
            route.undelivered_order_ids()
        }
        RouteCommand::Cancel => route.undelivered_order_ids(),
        _ => Vec::new(),
    };

    route.status = to;
    route.updated_at = now;
    progress_aggregator::refresh_totals(route);

    Ok(TransitionOutcome {
        from,
        to,
        released_orders,
    })
}

/// Solo una ruta planificada admite cambios de membresía, vehículo o fecha
pub fn ensure_editable(route: &Route, command: &str) -> AppResult<()> {
    if route.status != RouteStatus::Planned {
        return Err(invalid(
            route.status,
            command,
            format!("Solo se puede modificar una ruta planificada (estado actual: {})", route.status.label()),
        ));
    }
    Ok(())
}

fn ensure_underway(route: &Route, command: &str) -> AppResult<()> {
    if !route.status.is_underway() {
        return Err(invalid(
            route.status,
            command,
            format!("La ruta no está en operación (estado actual: {})", route.status.label()),
        ));
    }
    Ok(())
}

/// Registrar la llegada al punto de entrega de un pedido
pub fn record_arrival(route: &mut Route, order_id: i64, now: DateTime<Utc>) -> AppResult<()> {
    ensure_underway(route, "record_arrival")?;
    let route_code = route.code.clone();
    let membership = route
        .membership_mut(order_id)
        .ok_or_else(|| not_found_error(&format!("Order in route {}", route_code), order_id))?;

    if membership.delivered {
        return Err(validation_error(format!("El pedido {} ya fue entregado", order_id)));
    }
    membership.arrival_at = Some(now);
    route.updated_at = now;
    Ok(())
}

/// Marcar un pedido como entregado.
///
/// Una entrega solo existe con la ruta en tránsito o entregando; si la ruta
/// sigue en `in_progress` o `in_transit` avanza a `delivering` en el mismo paso.
/// Devuelve el estado previo cuando hubo avance.
pub fn record_delivery(
    route: &mut Route,
    order_id: i64,
    receiver_name: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> AppResult<Option<RouteStatus>> {
    ensure_underway(route, "record_delivery")?;
    if receiver_name.trim().is_empty() {
        return Err(validation_error("El nombre de quien recibe es obligatorio"));
    }

    let route_code = route.code.clone();
    let membership = route
        .membership_mut(order_id)
        .ok_or_else(|| not_found_error(&format!("Order in route {}", route_code), order_id))?;

    if membership.delivered {
        return Err(validation_error(format!("El pedido {} ya fue entregado", order_id)));
    }

    membership.delivered = true;
    membership.delivered_at = Some(now);
    membership.departure_at = Some(now);
    membership.arrival_at.get_or_insert(now);
    membership.receiver_name = Some(receiver_name.trim().to_string());
    if let Some(notes) = notes {
        membership.delivery_notes = notes;
    }

    let advanced_from = if route.status == RouteStatus::Delivering {
        None
    } else {
        let previous = route.status;
        route.status = RouteStatus::Delivering;
        Some(previous)
    };

    route.updated_at = now;
    progress_aggregator::refresh_totals(route);
    Ok(advanced_from)
}

/// Servicio que ejecuta comandos de ciclo de vida con bloqueo por ruta
pub struct RouteLifecycleService {
    store: Arc<dyn RouteStore>,
    orders: Arc<dyn OrderService>,
    locks: RouteLocks,
    policy: FinishPolicy,
}

impl RouteLifecycleService {
    pub fn new(
        store: Arc<dyn RouteStore>,
        orders: Arc<dyn OrderService>,
        locks: RouteLocks,
        policy: FinishPolicy,
    ) -> Self {
        Self {
            store,
            orders,
            locks,
            policy,
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Route> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| not_found_error("Route", id))
    }

    /// Ejecutar un comando y propagar la liberación de pedidos
    pub async fn execute(&self, id: Uuid, command: RouteCommand) -> AppResult<Route> {
        let (route, outcome) = {
            let _guard = self.locks.acquire(id).await;
            let mut route = self.load(id).await?;
            let outcome = apply(&mut route, command, self.policy, Utc::now())?;
            self.store.save(&route).await?;
            (route, outcome)
        };
        if outcome.to.is_terminal() {
            self.locks.forget(id).await;
        }

        info!(
            "🚚 Ruta {} {} -> {} ({})",
            route.code, outcome.from, outcome.to, command
        );

        if !outcome.released_orders.is_empty() {
            self.release_orders(&route, &outcome.released_orders).await;
        }

        Ok(route)
    }

    pub async fn record_arrival(&self, id: Uuid, order_id: i64) -> AppResult<Route> {
        let _guard = self.locks.acquire(id).await;
        let mut route = self.load(id).await?;
        record_arrival(&mut route, order_id, Utc::now())?;
        self.store.save(&route).await?;
        info!("📍 Ruta {}: llegada registrada para pedido {}", route.code, order_id);
        Ok(route)
    }

    pub async fn record_delivery(
        &self,
        id: Uuid,
        order_id: i64,
        receiver_name: &str,
        notes: Option<String>,
    ) -> AppResult<Route> {
        let route = {
            let _guard = self.locks.acquire(id).await;
            let mut route = self.load(id).await?;
            let advanced_from = record_delivery(&mut route, order_id, receiver_name, notes, Utc::now())?;
            self.store.save(&route).await?;
            if let Some(previous) = advanced_from {
                info!("🚚 Ruta {} {} -> {} (entrega registrada)", route.code, previous, route.status);
            }
            route
        };

        info!(
            "📦 Ruta {}: pedido {} entregado ({}/{})",
            route.code, order_id, route.delivered_orders, route.total_orders
        );

        if let Err(e) = self.orders.mark_delivered(order_id).await {
            warn!("⚠️ No se pudo notificar la entrega del pedido {}: {}", order_id, e);
        }

        Ok(route)
    }

    async fn release_orders(&self, route: &Route, order_ids: &[i64]) {
        let results = join_all(order_ids.iter().map(|id| self.orders.release(*id))).await;
        for (order_id, result) in order_ids.iter().zip(results) {
            if let Err(e) = result {
                warn!("⚠️ Ruta {}: no se pudo liberar el pedido {}: {}", route.code, order_id, e);
            }
        }
        info!("🔓 Ruta {}: {} pedidos liberados", route.code, order_ids.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Order, OrderStatus, RouteMembership};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn route(status: RouteStatus, vehicle: Option<i64>, members: usize) -> Route {
        let memberships = (1..=members as i64)
            .map(|id| {
                let order = Order {
                    id,
                    tracking_code: format!("PED-{}", id),
                    customer_name: "Cliente".to_string(),
                    municipality: None,
                    region_id: None,
                    weight_kg: Some(Decimal::from(10)),
                    volume_m3: None,
                    total: Decimal::ZERO,
                    status: OrderStatus::ReadyForDelivery,
                };
                RouteMembership::snapshot(&order, id as i32, 5)
            })
            .collect();
        let now = Utc::now();
        Route {
            id: Uuid::new_v4(),
            code: "RUT-20250101-0001".to_string(),
            name: "Ruta de prueba".to_string(),
            region_id: 1,
            vehicle_id: vehicle,
            technician_id: 7,
            operator_id: None,
            origin_point_id: None,
            planned_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            actual_start: None,
            actual_end: None,
            status,
            tags: BTreeSet::new(),
            notes: String::new(),
            estimated_km: None,
            total_weight_kg: Decimal::ZERO,
            total_volume_m3: Decimal::ZERO,
            total_orders: 0,
            delivered_orders: 0,
            memberships,
            created_at: now,
            updated_at: now,
        }
    }

    fn allowed(from: RouteStatus, command: RouteCommand) -> Option<RouteStatus> {
        use RouteCommand::*;
        use RouteStatus::*;
        match (from, command) {
            (Planned, Confirm) => Some(Assigned),
            (Planned, Start) | (Assigned, Start) => Some(InProgress),
            (InProgress, Dispatch) => Some(InTransit),
            (InTransit, BeginDelivery) => Some(Delivering),
            (InProgress, Finish) | (InTransit, Finish) | (Delivering, Finish) => Some(Completed),
            (Planned, Cancel) | (Assigned, Cancel) | (InProgress, Cancel) | (InTransit, Cancel)
            | (Delivering, Cancel) => Some(Cancelled),
            _ => None,
        }
    }

    #[test]
    fn test_transition_table_is_total() {
        for status in RouteStatus::ALL {
            for command in RouteCommand::ALL {
                let result = next_status(status, command);
                match allowed(status, command) {
                    Some(expected) => assert_eq!(result.unwrap(), expected, "{} {}", status, command),
                    None if command == RouteCommand::Start => assert!(
                        matches!(result, Err(AppError::AlreadyStarted { .. })),
                        "{} {}",
                        status,
                        command
                    ),
                    None => assert!(
                        matches!(result, Err(AppError::InvalidTransition { .. })),
                        "{} {}",
                        status,
                        command
                    ),
                }
            }
        }
    }

    #[test]
    fn test_start_requires_vehicle() {
        let mut r = route(RouteStatus::Planned, None, 2);
        let err = apply(&mut r, RouteCommand::Start, FinishPolicy::RequireDelivery, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(r.status, RouteStatus::Planned);
        assert!(r.actual_start.is_none());
    }

    #[test]
    fn test_empty_route_cannot_leave_planned() {
        let mut r = route(RouteStatus::Planned, Some(3), 0);
        for command in [RouteCommand::Confirm, RouteCommand::Start, RouteCommand::Cancel] {
            assert!(apply(&mut r, command, FinishPolicy::RequireDelivery, Utc::now()).is_err());
        }
    }

    #[test]
    fn test_start_sets_actual_start() {
        let mut r = route(RouteStatus::Assigned, Some(3), 1);
        let now = Utc::now();
        let outcome = apply(&mut r, RouteCommand::Start, FinishPolicy::RequireDelivery, now).unwrap();
        assert_eq!(outcome.to, RouteStatus::InProgress);
        assert_eq!(r.actual_start, Some(now));
    }

    #[test]
    fn test_finish_policy() {
        let mut r = route(RouteStatus::InProgress, Some(3), 2);
        assert!(apply(&mut r, RouteCommand::Finish, FinishPolicy::RequireDelivery, Utc::now()).is_err());

        let outcome = apply(&mut r, RouteCommand::Finish, FinishPolicy::Unconditional, Utc::now()).unwrap();
        assert_eq!(outcome.to, RouteStatus::Completed);
        assert_eq!(outcome.released_orders, vec![1, 2]);
        assert!(r.actual_end.is_some());
    }

    #[test]
    fn test_finish_twice_leaves_route_unchanged() {
        let mut r = route(RouteStatus::InProgress, Some(3), 2);
        record_delivery(&mut r, 1, "María", None, Utc::now()).unwrap();
        apply(&mut r, RouteCommand::Finish, FinishPolicy::RequireDelivery, Utc::now()).unwrap();
        let before = r.clone();

        let err = apply(&mut r, RouteCommand::Finish, FinishPolicy::RequireDelivery, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(r.status, before.status);
        assert_eq!(r.actual_end, before.actual_end);
        assert_eq!(r.updated_at, before.updated_at);
    }

    #[test]
    fn test_delivery_advances_to_delivering() {
        let mut r = route(RouteStatus::InProgress, Some(3), 2);
        let advanced = record_delivery(&mut r, 2, "Juan Pérez", Some("Portón verde".into()), Utc::now()).unwrap();
        assert_eq!(advanced, Some(RouteStatus::InProgress));
        assert_eq!(r.status, RouteStatus::Delivering);
        assert_eq!(r.delivered_orders, 1);

        let m = r.membership(2).unwrap();
        assert!(m.delivered);
        assert_eq!(m.receiver_name.as_deref(), Some("Juan Pérez"));
        assert_eq!(m.delivery_notes, "Portón verde");
        assert!(m.departure_at.is_some());
    }

    #[test]
    fn test_delivery_rejected_before_start_and_twice() {
        let mut r = route(RouteStatus::Planned, Some(3), 1);
        assert!(record_delivery(&mut r, 1, "Ana", None, Utc::now()).is_err());

        let mut r = route(RouteStatus::Delivering, Some(3), 1);
        record_delivery(&mut r, 1, "Ana", None, Utc::now()).unwrap();
        assert!(record_delivery(&mut r, 1, "Ana", None, Utc::now()).is_err());
        assert!(record_delivery(&mut r, 99, "Ana", None, Utc::now()).is_err());
    }

    #[test]
    fn test_delivery_requires_receiver() {
        let mut r = route(RouteStatus::InTransit, Some(3), 1);
        assert!(record_delivery(&mut r, 1, "  ", None, Utc::now()).is_err());
        assert!(!r.memberships[0].delivered);
    }

    #[test]
    fn test_cancel_releases_undelivered() {
        let mut r = route(RouteStatus::Delivering, Some(3), 3);
        record_delivery(&mut r, 2, "Ana", None, Utc::now()).unwrap();
        let outcome = apply(&mut r, RouteCommand::Cancel, FinishPolicy::RequireDelivery, Utc::now()).unwrap();
        assert_eq!(outcome.released_orders, vec![1, 3]);
        assert_eq!(r.status, RouteStatus::Cancelled);
    }

    #[test]
    fn test_ensure_editable() {
        assert!(ensure_editable(&route(RouteStatus::Planned, None, 1), "update").is_ok());
        assert!(ensure_editable(&route(RouteStatus::Assigned, None, 1), "update").is_err());
    }

    #[test]
    fn test_finish_policy_parse() {
        assert_eq!("unconditional".parse::<FinishPolicy>().unwrap(), FinishPolicy::Unconditional);
        assert!("sometimes".parse::<FinishPolicy>().is_err());
    }
}
