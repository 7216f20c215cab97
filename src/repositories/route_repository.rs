use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ActiveMembership, Route, RouteFilter, RouteMembership, RouteStatus, RouteTag};
use crate::repositories::RouteStore;
use crate::utils::errors::{AppError, AppResult};

const ACTIVE_ORDER_INDEX: &str = "uq_route_memberships_active_order";

// Fila de la tabla routes
#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    code: String,
    name: String,
    region_id: i64,
    vehicle_id: Option<i64>,
    technician_id: i64,
    operator_id: Option<i64>,
    origin_point_id: Option<i64>,
    planned_date: NaiveDate,
    actual_start: Option<DateTime<Utc>>,
    actual_end: Option<DateTime<Utc>>,
    status: RouteStatus,
    tags: Vec<String>,
    notes: String,
    estimated_km: Option<Decimal>,
    total_weight_kg: Decimal,
    total_volume_m3: Decimal,
    total_orders: i32,
    delivered_orders: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RouteRow {
    fn into_route(self, memberships: Vec<RouteMembership>) -> AppResult<Route> {
        let tags = RouteTag::parse_set(&self.tags)
            .map_err(|e| AppError::Internal(format!("Etiquetas inválidas en ruta {}: {}", self.code, e)))?;

        Ok(Route {
            id: self.id,
            code: self.code,
            name: self.name,
            region_id: self.region_id,
            vehicle_id: self.vehicle_id,
            technician_id: self.technician_id,
            operator_id: self.operator_id,
            origin_point_id: self.origin_point_id,
            planned_date: self.planned_date,
            actual_start: self.actual_start,
            actual_end: self.actual_end,
            status: self.status,
            tags,
            notes: self.notes,
            estimated_km: self.estimated_km,
            total_weight_kg: self.total_weight_kg,
            total_volume_m3: self.total_volume_m3,
            total_orders: self.total_orders,
            delivered_orders: self.delivered_orders,
            memberships,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    route_id: Uuid,
    sequence: i32,
    order_id: i64,
    tracking_code: String,
    customer_name: String,
    municipality: Option<String>,
    weight_kg: Decimal,
    volume_m3: Decimal,
    order_total: Decimal,
    priority: i16,
    arrival_at: Option<DateTime<Utc>>,
    departure_at: Option<DateTime<Utc>>,
    delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    receiver_name: Option<String>,
    delivery_notes: String,
}

impl From<MembershipRow> for RouteMembership {
    fn from(row: MembershipRow) -> Self {
        RouteMembership {
            sequence: row.sequence,
            order_id: row.order_id,
            tracking_code: row.tracking_code,
            customer_name: row.customer_name,
            municipality: row.municipality,
            weight_kg: row.weight_kg,
            volume_m3: row.volume_m3,
            order_total: row.order_total,
            priority: row.priority,
            arrival_at: row.arrival_at,
            departure_at: row.departure_at,
            delivered: row.delivered,
            delivered_at: row.delivered_at,
            receiver_name: row.receiver_name,
            delivery_notes: row.delivery_notes,
        }
    }
}

/// Route Store sobre PostgreSQL
pub struct PgRouteRepository {
    pool: PgPool,
}

impl PgRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_memberships(&self, route_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<RouteMembership>>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT route_id, sequence, order_id, tracking_code, customer_name, municipality,
                   weight_kg, volume_m3, order_total, priority, arrival_at, departure_at,
                   delivered, delivered_at, receiver_name, delivery_notes
            FROM route_memberships
            WHERE route_id = ANY($1)
            ORDER BY route_id, sequence
            "#,
        )
        .bind(route_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<RouteMembership>> = HashMap::new();
        for row in rows {
            grouped.entry(row.route_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn insert_memberships(tx: &mut Transaction<'_, Postgres>, route: &Route) -> AppResult<()> {
        let active = !route.status.is_terminal();
        for membership in &route.memberships {
            sqlx::query(
                r#"
                INSERT INTO route_memberships (
                    route_id, sequence, order_id, tracking_code, customer_name, municipality,
                    weight_kg, volume_m3, order_total, priority, arrival_at, departure_at,
                    delivered, delivered_at, receiver_name, delivery_notes, active
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(route.id)
            .bind(membership.sequence)
            .bind(membership.order_id)
            .bind(&membership.tracking_code)
            .bind(&membership.customer_name)
            .bind(&membership.municipality)
            .bind(membership.weight_kg)
            .bind(membership.volume_m3)
            .bind(membership.order_total)
            .bind(membership.priority)
            .bind(membership.arrival_at)
            .bind(membership.departure_at)
            .bind(membership.delivered)
            .bind(membership.delivered_at)
            .bind(&membership.receiver_name)
            .bind(&membership.delivery_notes)
            .bind(active)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, Some(membership.order_id)))?;
        }
        Ok(())
    }
}

fn tag_values(route: &Route) -> Vec<String> {
    route.tags.iter().map(|tag| tag.as_str().to_string()).collect()
}

/// Traducir la violación del índice de membresía activa a `OrderUnavailable`
fn map_write_error(error: sqlx::Error, order_id: Option<i64>) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.constraint() == Some(ACTIVE_ORDER_INDEX) {
            warn!("⚠️ Pedido {:?} ya pertenece a otra ruta activa", order_id);
            return AppError::OrderUnavailable {
                order_id,
                reason: "El pedido ya pertenece a otra ruta activa".to_string(),
            };
        }
    }
    AppError::Database(error)
}

#[async_trait]
impl RouteStore for PgRouteRepository {
    async fn list(&self, filter: &RouteFilter) -> AppResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT * FROM routes
            WHERE ($1::route_status IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR region_id = $2)
            ORDER BY planned_date DESC, created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(filter.region_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut memberships = self.load_memberships(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let members = memberships.remove(&row.id).unwrap_or_default();
                row.into_route(members)
            })
            .collect()
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let members = self.load_memberships(&[id]).await?.remove(&id).unwrap_or_default();
                Ok(Some(row.into_route(members)?))
            }
            None => Ok(None),
        }
    }

    async fn next_code_sequence(&self) -> AppResult<i64> {
        let (value,): (i64,) = sqlx::query_as("SELECT nextval('route_code_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(value)
    }

    async fn insert(&self, route: &Route) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO routes (
                id, code, name, region_id, vehicle_id, technician_id, operator_id, origin_point_id,
                planned_date, actual_start, actual_end, status, tags, notes, estimated_km,
                total_weight_kg, total_volume_m3, total_orders, delivered_orders, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(route.id)
        .bind(&route.code)
        .bind(&route.name)
        .bind(route.region_id)
        .bind(route.vehicle_id)
        .bind(route.technician_id)
        .bind(route.operator_id)
        .bind(route.origin_point_id)
        .bind(route.planned_date)
        .bind(route.actual_start)
        .bind(route.actual_end)
        .bind(route.status)
        .bind(tag_values(route))
        .bind(&route.notes)
        .bind(route.estimated_km)
        .bind(route.total_weight_kg)
        .bind(route.total_volume_m3)
        .bind(route.total_orders)
        .bind(route.delivered_orders)
        .bind(route.created_at)
        .bind(route.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, None))?;

        Self::insert_memberships(&mut tx, route).await?;
        tx.commit().await?;

        debug!("💾 Ruta {} insertada con {} pedidos", route.code, route.memberships.len());
        Ok(())
    }

    async fn save(&self, route: &Route) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE routes SET
                name = $2, region_id = $3, vehicle_id = $4, technician_id = $5, operator_id = $6,
                origin_point_id = $7, planned_date = $8, actual_start = $9, actual_end = $10,
                status = $11, tags = $12, notes = $13, estimated_km = $14, total_weight_kg = $15,
                total_volume_m3 = $16, total_orders = $17, delivered_orders = $18, updated_at = $19
            WHERE id = $1
            "#,
        )
        .bind(route.id)
        .bind(&route.name)
        .bind(route.region_id)
        .bind(route.vehicle_id)
        .bind(route.technician_id)
        .bind(route.operator_id)
        .bind(route.origin_point_id)
        .bind(route.planned_date)
        .bind(route.actual_start)
        .bind(route.actual_end)
        .bind(route.status)
        .bind(tag_values(route))
        .bind(&route.notes)
        .bind(route.estimated_km)
        .bind(route.total_weight_kg)
        .bind(route.total_volume_m3)
        .bind(route.total_orders)
        .bind(route.delivered_orders)
        .bind(route.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Route with id '{}' not found", route.id)));
        }

        sqlx::query("DELETE FROM route_memberships WHERE route_id = $1")
            .bind(route.id)
            .execute(&mut *tx)
            .await?;

        Self::insert_memberships(&mut tx, route).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_active_memberships(&self, order_ids: &[i64]) -> AppResult<Vec<ActiveMembership>> {
        let memberships = sqlx::query_as::<_, ActiveMembership>(
            r#"
            SELECT m.order_id, m.route_id, r.code AS route_code
            FROM route_memberships m
            JOIN routes r ON r.id = m.route_id
            WHERE m.active AND m.order_id = ANY($1)
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(memberships)
    }

    async fn count_deliveries_on(&self, date: NaiveDate, region_id: Option<i64>) -> AppResult<i64> {
        let start = date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt)).ok_or_else(|| {
            AppError::Internal(format!("Fecha inválida para el conteo de entregas: {}", date))
        })?;
        let end = start + Duration::days(1);

        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM route_memberships m
            JOIN routes r ON r.id = m.route_id
            WHERE m.delivered
              AND m.delivered_at >= $1 AND m.delivered_at < $2
              AND ($3::BIGINT IS NULL OR r.region_id = $3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(region_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn vehicles_in_use(&self) -> AppResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT vehicle_id
            FROM routes
            WHERE vehicle_id IS NOT NULL
              AND status IN ('in_progress', 'in_transit', 'delivering')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
