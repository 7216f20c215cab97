//! Motor de asignación de rutas
//!
//! Crea rutas a partir de pedidos listos, valida capacidad y personal,
//! asigna la secuencia de entrega y sincroniza el estado de los pedidos con
//! el servicio de pedidos. Todo alta o edición es de todo o nada.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::clients::{OrderService, ReferenceData};
use crate::dto::{CreateRouteRequest, UpdateRouteRequest};
use crate::models::{Order, Route, RouteMembership, RouteStatus, RouteTag, Vehicle};
use crate::repositories::RouteStore;
use crate::services::route_lifecycle::ensure_editable;
use crate::services::route_locks::RouteLocks;
use crate::services::{capacity_validator, progress_aggregator};
use crate::utils::errors::{not_found_error, order_unavailable, validation_error, AppResult};
use crate::utils::validation::{
    require, validate_non_negative, validate_not_blank, validate_order_ids, validate_planned_date,
    validate_priority, DEFAULT_PRIORITY,
};

pub struct RouteAssignmentService {
    store: Arc<dyn RouteStore>,
    orders: Arc<dyn OrderService>,
    reference: Arc<dyn ReferenceData>,
    locks: RouteLocks,
    code_prefix: String,
}

impl RouteAssignmentService {
    pub fn new(
        store: Arc<dyn RouteStore>,
        orders: Arc<dyn OrderService>,
        reference: Arc<dyn ReferenceData>,
        locks: RouteLocks,
        code_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orders,
            reference,
            locks,
            code_prefix: code_prefix.into(),
        }
    }

    /// Crear una ruta planificada con los pedidos indicados
    pub async fn create_route(&self, request: CreateRouteRequest) -> AppResult<Route> {
        request.validate()?;
        validate_not_blank("name", &request.name)?;
        let technician_id = require("technician_id", request.technician_id)?;
        let region_id = require("region_id", request.region_id)?;
        let planned_date = require("planned_date", request.planned_date)?;

        let now = Utc::now();
        validate_planned_date(planned_date, now.date_naive())?;
        validate_order_ids(&request.order_ids)?;
        validate_priorities(&request.order_ids, &request.priorities)?;
        if let Some(km) = request.estimated_km {
            validate_non_negative("estimated_km", km)?;
        }
        let tags = RouteTag::parse_set(&request.tags)?;

        // Referencias externas, antes de cualquier escritura
        self.ensure_person("Technician", technician_id).await?;
        if let Some(operator_id) = request.operator_id {
            self.ensure_person("Operator", operator_id).await?;
        }
        self.ensure_region(region_id).await?;
        if let Some(origin_point_id) = request.origin_point_id {
            self.ensure_origin_point(origin_point_id).await?;
        }

        let orders = self.resolve_orders(&request.order_ids).await?;
        self.ensure_not_in_active_route(&request.order_ids, None).await?;

        let vehicle = match request.vehicle_id {
            Some(vehicle_id) => {
                let vehicle = self.resolve_vehicle(vehicle_id).await?;
                capacity_validator::validate(&vehicle, &orders)?;
                Some(vehicle)
            }
            None => None,
        };

        let memberships = orders
            .iter()
            .enumerate()
            .map(|(index, order)| {
                let priority = request.priorities.get(&order.id).copied().unwrap_or(DEFAULT_PRIORITY);
                RouteMembership::snapshot(order, index as i32 + 1, priority)
            })
            .collect();

        let code = self.next_code(now.date_naive()).await?;
        let mut route = Route {
            id: Uuid::new_v4(),
            code,
            name: request.name.trim().to_string(),
            region_id,
            vehicle_id: vehicle.as_ref().map(|v| v.id),
            technician_id,
            operator_id: request.operator_id,
            origin_point_id: request.origin_point_id,
            planned_date,
            actual_start: None,
            actual_end: None,
            status: RouteStatus::Planned,
            tags,
            notes: request.notes.unwrap_or_default(),
            estimated_km: request.estimated_km,
            total_weight_kg: Default::default(),
            total_volume_m3: Default::default(),
            total_orders: 0,
            delivered_orders: 0,
            memberships,
            created_at: now,
            updated_at: now,
        };
        progress_aggregator::refresh_totals(&mut route);

        self.store.insert(&route).await?;

        if let Err(e) = self.mark_assigned_all(&route, &request.order_ids).await {
            error!("❌ Ruta {}: fallo al asignar pedidos, revirtiendo: {}", route.code, e);
            self.revert_create(&route).await;
            return Err(e);
        }

        info!(
            "✅ Ruta {} creada: {} pedidos, {} kg",
            route.code, route.total_orders, route.total_weight_kg
        );
        Ok(route)
    }

    /// Actualizar una ruta.
    ///
    /// Solo notas: permitido en cualquier estado. Cualquier otro campo exige
    /// que la ruta siga planificada y vuelve a validar el conjunto completo.
    pub async fn update_route(&self, id: Uuid, patch: UpdateRouteRequest) -> AppResult<Route> {
        patch.validate()?;

        if patch.is_notes_only() {
            return self.update_notes(id, patch.notes.unwrap_or_default()).await;
        }

        // Lectura sin bloqueo para resolver referencias externas fuera de la sección crítica
        let current = self.load(id).await?;
        ensure_editable(&current, "update")?;
        let prepared = self.prepare_update(&current, &patch).await?;

        let (route, previous, added, removed) = {
            let _guard = self.locks.acquire(id).await;
            let previous = self.load(id).await?;
            ensure_editable(&previous, "update")?;

            let mut route = previous.clone();
            let (added, removed) = self.apply_update(&mut route, &patch, &prepared).await?;
            self.store.save(&route).await?;
            (route, previous, added, removed)
        };

        if let Err(e) = self.mark_assigned_all(&route, &added).await {
            error!("❌ Ruta {}: fallo al asignar pedidos nuevos, revirtiendo: {}", route.code, e);
            self.revert_update(&route, &previous, &removed).await;
            return Err(e);
        }

        if !removed.is_empty() {
            self.release_all(&route.code, &removed).await;
        }

        info!("✅ Ruta {} actualizada ({} pedidos)", route.code, route.total_orders);
        Ok(route)
    }

    /// Eliminar una ruta planificada y liberar sus pedidos
    pub async fn delete_route(&self, id: Uuid) -> AppResult<Route> {
        let route = {
            let _guard = self.locks.acquire(id).await;
            let route = self.load(id).await?;
            ensure_editable(&route, "delete")?;
            if !self.store.delete(id).await? {
                return Err(not_found_error("Route", id));
            }
            route
        };
        self.locks.forget(id).await;

        self.release_all(&route.code, &route.order_ids()).await;
        info!("🗑️ Ruta {} eliminada", route.code);
        Ok(route)
    }

    async fn update_notes(&self, id: Uuid, notes: String) -> AppResult<Route> {
        let route = {
            let _guard = self.locks.acquire(id).await;
            let mut route = self.load(id).await?;
            route.notes = notes;
            route.updated_at = Utc::now();
            self.store.save(&route).await?;
            route
        };
        // Una ruta cerrada no vuelve a cambiar de estado: su bloqueo no se conserva
        if route.status.is_terminal() {
            self.locks.forget(id).await;
        }
        info!("📝 Ruta {}: notas actualizadas", route.code);
        Ok(route)
    }

    /// Deshacer un alta cuyos pedidos no se pudieron marcar.
    ///
    /// Solo se elimina si la ruta sigue siendo la versión recién creada; si
    /// alguien ya la confirmó o la inició, se conserva su estado.
    async fn revert_create(&self, created: &Route) {
        let gone = {
            let _guard = self.locks.acquire(created.id).await;
            match self.store.find(created.id).await {
                Ok(Some(current)) if current.is_same_revision(created) => {
                    match self.store.delete(created.id).await {
                        Ok(_) => true,
                        Err(e) => {
                            error!("❌ No se pudo eliminar la ruta {}: {}", created.code, e);
                            false
                        }
                    }
                }
                Ok(Some(current)) => {
                    warn!(
                        "⚠️ Ruta {} cambió a {} antes de revertir el alta; se conserva",
                        created.code, current.status
                    );
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    error!("❌ No se pudo leer la ruta {} para revertir: {}", created.code, e);
                    false
                }
            }
        };
        if gone {
            self.locks.forget(created.id).await;
        }
    }

    /// Deshacer un PATCH cuyos pedidos nuevos no se pudieron marcar.
    ///
    /// Si la ruta sigue en la versión guardada por el PATCH se restaura la
    /// anterior. Si cambió mientras tanto se conserva el estado más nuevo y
    /// solo se liberan los pedidos quitados que ya no pertenecen a la ruta.
    /// Los pedidos agregados ya los liberó `mark_assigned_all`.
    async fn revert_update(&self, saved: &Route, previous: &Route, removed: &[i64]) {
        let orphaned: Vec<i64> = {
            let _guard = self.locks.acquire(saved.id).await;
            let current = match self.store.find(saved.id).await {
                Ok(current) => current,
                Err(e) => {
                    error!("❌ No se pudo leer la ruta {} para revertir: {}", saved.code, e);
                    return;
                }
            };

            match current {
                Some(current) if current.is_same_revision(saved) => {
                    let mut restored = previous.clone();
                    restored.updated_at = Utc::now();
                    if let Err(e) = self.store.save(&restored).await {
                        error!("❌ No se pudo restaurar la ruta {}: {}", saved.code, e);
                    }
                    return;
                }
                Some(current) => {
                    warn!(
                        "⚠️ Ruta {} cambió a {} antes de revertir la edición; se conserva",
                        saved.code, current.status
                    );
                    removed
                        .iter()
                        .copied()
                        .filter(|id| current.membership(*id).is_none())
                        .collect()
                }
                None => removed.to_vec(),
            }
        };
        self.release_all(&saved.code, &orphaned).await;
    }

    /// Resolver lo que el PATCH necesita de los colaboradores externos
    async fn prepare_update(&self, current: &Route, patch: &UpdateRouteRequest) -> AppResult<PreparedUpdate> {
        if let Some(name) = &patch.name {
            validate_not_blank("name", name)?;
        }
        if let Some(planned_date) = patch.planned_date {
            validate_planned_date(planned_date, current.created_at.date_naive())?;
        }
        if let Some(Some(km)) = patch.estimated_km {
            validate_non_negative("estimated_km", km)?;
        }
        let tags = patch.tags.as_deref().map(RouteTag::parse_set).transpose()?;

        if let Some(technician_id) = patch.technician_id {
            self.ensure_person("Technician", technician_id).await?;
        }
        if let Some(Some(operator_id)) = patch.operator_id {
            self.ensure_person("Operator", operator_id).await?;
        }
        if let Some(region_id) = patch.region_id {
            self.ensure_region(region_id).await?;
        }
        if let Some(Some(origin_point_id)) = patch.origin_point_id {
            self.ensure_origin_point(origin_point_id).await?;
        }

        let mut new_orders = HashMap::new();
        if patch.touches_membership() {
            let order_ids = patch.order_ids.clone().unwrap_or_else(|| current.order_ids());
            validate_order_ids(&order_ids)?;
            if let Some(priorities) = &patch.priorities {
                validate_priorities(&order_ids, priorities)?;
            }

            let new_ids: Vec<i64> = order_ids
                .iter()
                .copied()
                .filter(|id| current.membership(*id).is_none())
                .collect();
            new_orders = self
                .resolve_orders(&new_ids)
                .await?
                .into_iter()
                .map(|order| (order.id, order))
                .collect();
        }

        let vehicle_id = match patch.vehicle_id {
            Some(vehicle_id) => vehicle_id,
            None => current.vehicle_id,
        };
        let vehicle = match vehicle_id {
            Some(vehicle_id) => Some(self.resolve_vehicle(vehicle_id).await?),
            None => None,
        };

        Ok(PreparedUpdate {
            tags,
            order_ids: patch.order_ids.clone(),
            new_orders,
            vehicle,
        })
    }

    /// Aplicar el PATCH bajo el bloqueo de la ruta. Devuelve (agregados, quitados).
    async fn apply_update(
        &self,
        route: &mut Route,
        patch: &UpdateRouteRequest,
        prepared: &PreparedUpdate,
    ) -> AppResult<(Vec<i64>, Vec<i64>)> {
        let previous_ids = route.order_ids();
        // Sin lista nueva se conserva la membresía leída bajo el bloqueo
        let order_ids = prepared.order_ids.clone().unwrap_or_else(|| previous_ids.clone());
        let mut memberships = Vec::with_capacity(order_ids.len());
        let mut added = Vec::new();

        for order_id in &order_ids {
            let membership = match route.membership(*order_id) {
                Some(existing) => existing.clone(),
                None => {
                    let order = prepared.new_orders.get(order_id).ok_or_else(|| {
                        order_unavailable(*order_id, "La ruta cambió mientras se editaba; vuelva a intentarlo")
                    })?;
                    added.push(*order_id);
                    RouteMembership::snapshot(order, 0, DEFAULT_PRIORITY)
                }
            };
            memberships.push(membership);
        }

        if let Some(priorities) = &patch.priorities {
            for membership in memberships.iter_mut() {
                if let Some(priority) = priorities.get(&membership.order_id) {
                    membership.priority = *priority;
                }
            }
        }

        if !added.is_empty() {
            self.ensure_not_in_active_route(&added, Some(route.id)).await?;
        }

        let removed: Vec<i64> = previous_ids
            .into_iter()
            .filter(|id| !order_ids.contains(id))
            .collect();

        let expected_vehicle = match patch.vehicle_id {
            Some(vehicle_id) => vehicle_id,
            None => route.vehicle_id,
        };
        if expected_vehicle != prepared.vehicle.as_ref().map(|v| v.id) {
            return Err(validation_error(
                "El vehículo de la ruta cambió mientras se editaba; vuelva a intentarlo",
            ));
        }
        if let Some(vehicle) = &prepared.vehicle {
            capacity_validator::validate(vehicle, &memberships)?;
        }

        if let Some(name) = &patch.name {
            route.name = name.trim().to_string();
        }
        if let Some(technician_id) = patch.technician_id {
            route.technician_id = technician_id;
        }
        if let Some(operator_id) = patch.operator_id {
            route.operator_id = operator_id;
        }
        if let Some(planned_date) = patch.planned_date {
            route.planned_date = planned_date;
        }
        if let Some(region_id) = patch.region_id {
            route.region_id = region_id;
        }
        if let Some(origin_point_id) = patch.origin_point_id {
            route.origin_point_id = origin_point_id;
        }
        if let Some(estimated_km) = patch.estimated_km {
            route.estimated_km = estimated_km;
        }
        if let Some(tags) = &prepared.tags {
            route.tags = tags.clone();
        }
        if let Some(notes) = &patch.notes {
            route.notes = notes.clone();
        }
        route.vehicle_id = expected_vehicle;

        route.memberships = memberships;
        route.resequence();
        route.updated_at = Utc::now();
        progress_aggregator::refresh_totals(route);

        Ok((added, removed))
    }

    async fn load(&self, id: Uuid) -> AppResult<Route> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| not_found_error("Route", id))
    }

    async fn next_code(&self, date: NaiveDate) -> AppResult<String> {
        let sequence = self.store.next_code_sequence().await?;
        Ok(format!("{}-{}-{:04}", self.code_prefix, date.format("%Y%m%d"), sequence))
    }

    /// Resolver pedidos conservando el orden dado; todos deben estar listos
    async fn resolve_orders(&self, order_ids: &[i64]) -> AppResult<Vec<Order>> {
        let results = join_all(order_ids.iter().map(|id| self.orders.get_order(*id))).await;

        let mut orders = Vec::with_capacity(order_ids.len());
        for (order_id, result) in order_ids.iter().zip(results) {
            let order = result?.ok_or_else(|| not_found_error("Order", order_id))?;
            if !order.is_ready() {
                return Err(order_unavailable(
                    *order_id,
                    format!("El pedido no está listo para entrega (estado: {})", order.status.as_str()),
                ));
            }
            orders.push(order);
        }
        Ok(orders)
    }

    async fn ensure_not_in_active_route(&self, order_ids: &[i64], own_route: Option<Uuid>) -> AppResult<()> {
        let taken = self.store.find_active_memberships(order_ids).await?;
        match taken.into_iter().find(|m| Some(m.route_id) != own_route) {
            Some(membership) => Err(order_unavailable(
                membership.order_id,
                format!("El pedido ya pertenece a la ruta activa {}", membership.route_code),
            )),
            None => Ok(()),
        }
    }

    async fn resolve_vehicle(&self, vehicle_id: i64) -> AppResult<Vehicle> {
        let vehicle = self
            .reference
            .get_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", vehicle_id))?;
        if !vehicle.active {
            return Err(validation_error(format!(
                "El vehículo {} está inactivo",
                vehicle.license_plate
            )));
        }
        Ok(vehicle)
    }

    async fn ensure_person(&self, role: &str, person_id: i64) -> AppResult<()> {
        match self.reference.get_person(person_id).await? {
            Some(person) if person.active => Ok(()),
            Some(person) => Err(validation_error(format!(
                "{} {} está inactivo",
                role, person.full_name
            ))),
            None => Err(not_found_error(role, person_id)),
        }
    }

    async fn ensure_region(&self, region_id: i64) -> AppResult<()> {
        let regions = self.reference.list_regions().await?;
        if regions.iter().any(|r| r.id == region_id) {
            Ok(())
        } else {
            Err(not_found_error("Region", region_id))
        }
    }

    async fn ensure_origin_point(&self, origin_point_id: i64) -> AppResult<()> {
        let points = self.reference.list_origin_points().await?;
        if points.iter().any(|p| p.id == origin_point_id) {
            Ok(())
        } else {
            Err(not_found_error("Origin point", origin_point_id))
        }
    }

    /// Marcar pedidos como asignados; si uno falla se liberan los ya marcados
    async fn mark_assigned_all(&self, route: &Route, order_ids: &[i64]) -> AppResult<()> {
        let mut marked = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            if let Err(e) = self.orders.mark_assigned(*order_id, route.id).await {
                self.release_all(&route.code, &marked).await;
                return Err(e);
            }
            marked.push(*order_id);
        }
        Ok(())
    }

    async fn release_all(&self, route_code: &str, order_ids: &[i64]) {
        let results = join_all(order_ids.iter().map(|id| self.orders.release(*id))).await;
        for (order_id, result) in order_ids.iter().zip(results) {
            if let Err(e) = result {
                warn!("⚠️ Ruta {}: no se pudo liberar el pedido {}: {}", route_code, order_id, e);
            }
        }
        if !order_ids.is_empty() {
            info!("🔓 Ruta {}: {} pedidos liberados", route_code, order_ids.len());
        }
    }
}

struct PreparedUpdate {
    tags: Option<BTreeSet<RouteTag>>,
    /// Lista nueva de pedidos; `None` conserva la de la ruta
    order_ids: Option<Vec<i64>>,
    new_orders: HashMap<i64, Order>,
    vehicle: Option<Vehicle>,
}

/// Las prioridades deben referirse a pedidos de la ruta y estar en rango
fn validate_priorities(order_ids: &[i64], priorities: &HashMap<i64, i16>) -> AppResult<()> {
    for (order_id, priority) in priorities {
        if !order_ids.contains(order_id) {
            return Err(validation_error(format!(
                "Prioridad indicada para el pedido {} que no está en la ruta",
                order_id
            )));
        }
        validate_priority(*order_id, *priority)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::AppError;

    #[test]
    fn test_validate_priorities() {
        let mut priorities = HashMap::new();
        priorities.insert(2, 1);
        assert!(validate_priorities(&[1, 2], &priorities).is_ok());

        priorities.insert(3, 2);
        assert!(matches!(validate_priorities(&[1, 2], &priorities), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_priority_out_of_range() {
        let mut priorities = HashMap::new();
        priorities.insert(1, 9);
        assert!(validate_priorities(&[1], &priorities).is_err());
    }
}
