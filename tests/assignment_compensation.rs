mod common;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use common::*;
use delivery_dispatch::clients::{InMemoryOrderService, OrderService};
use delivery_dispatch::dto::UpdateRouteRequest;
use delivery_dispatch::models::{Order, OrderFilters, OrderStatus, RouteFilter, RouteStatus};
use delivery_dispatch::repositories::RouteStore;
use delivery_dispatch::services::{FinishPolicy, RouteCommand};
use delivery_dispatch::utils::errors::{AppError, AppResult};

/// Servicio de pedidos que se detiene al marcar un pedido y luego falla
struct PausingOrders {
    inner: InMemoryOrderService,
    order_id: i64,
    reached: Arc<Notify>,
    resume: Arc<Notify>,
}

#[async_trait]
impl OrderService for PausingOrders {
    async fn list_ready_orders(&self, filters: &OrderFilters) -> AppResult<Vec<Order>> {
        self.inner.list_ready_orders(filters).await
    }

    async fn get_order(&self, order_id: i64) -> AppResult<Option<Order>> {
        self.inner.get_order(order_id).await
    }

    async fn mark_assigned(&self, order_id: i64, route_id: Uuid) -> AppResult<()> {
        if order_id == self.order_id {
            self.reached.notify_one();
            self.resume.notified().await;
            return Err(AppError::ExternalApi("Servicio de pedidos caído".to_string()));
        }
        self.inner.mark_assigned(order_id, route_id).await
    }

    async fn release(&self, order_id: i64) -> AppResult<()> {
        self.inner.release(order_id).await
    }

    async fn mark_delivered(&self, order_id: i64) -> AppResult<()> {
        self.inner.mark_delivered(order_id).await
    }
}

async fn pausing_harness(order_id: i64) -> (Harness, Arc<Notify>, Arc<Notify>) {
    let reached = Arc::new(Notify::new());
    let resume = Arc::new(Notify::new());
    let (r, s) = (reached.clone(), resume.clone());
    let h = Harness::with_order_service(FinishPolicy::RequireDelivery, move |inner| {
        Arc::new(PausingOrders {
            inner,
            order_id,
            reached: r,
            resume: s,
        }) as Arc<dyn OrderService>
    })
    .await;
    (h, reached, resume)
}

#[tokio::test]
async fn test_failed_update_keeps_route_started_meanwhile() {
    let (h, reached, resume) = pausing_harness(2).await;
    h.ready_orders(1, &[100, 100]).await;
    let route = h
        .assignment
        .create_route(create_request(&[1], Some(PICKUP)))
        .await
        .unwrap();
    let route_id = route.id;

    let assignment = h.assignment.clone();
    let update = tokio::spawn(async move {
        let patch = UpdateRouteRequest {
            order_ids: Some(vec![1, 2]),
            ..Default::default()
        };
        assignment.update_route(route_id, patch).await
    });

    // El PATCH ya guardó y espera al servicio de pedidos
    reached.notified().await;
    let started = h.lifecycle.execute(route_id, RouteCommand::Start).await.unwrap();
    assert_eq!(started.status, RouteStatus::InProgress);
    resume.notify_one();

    let err = update.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::ExternalApi(_)));

    let stored = h.store.find(route_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RouteStatus::InProgress);
    assert_eq!(stored.actual_start, started.actual_start);
    assert!(stored.actual_start.is_some());
    assert_eq!(h.orders.status_of(1).await, Some(OrderStatus::OnRoute));
}

#[tokio::test]
async fn test_failed_create_keeps_route_started_meanwhile() {
    let (h, reached, resume) = pausing_harness(2).await;
    h.ready_orders(1, &[100, 100]).await;

    let assignment = h.assignment.clone();
    let create = tokio::spawn(async move { assignment.create_route(create_request(&[1, 2], Some(PICKUP))).await });

    reached.notified().await;
    let listed = h.store.list(&RouteFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    let route_id = listed[0].id;
    h.lifecycle.execute(route_id, RouteCommand::Start).await.unwrap();
    resume.notify_one();

    let err = create.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::ExternalApi(_)));

    let stored = h.store.find(route_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RouteStatus::InProgress);
    assert!(stored.actual_start.is_some());
}

#[tokio::test]
async fn test_failed_create_removes_untouched_route() {
    let (h, reached, resume) = pausing_harness(2).await;
    h.ready_orders(1, &[100, 100]).await;

    let assignment = h.assignment.clone();
    let create = tokio::spawn(async move { assignment.create_route(create_request(&[1, 2], Some(PICKUP))).await });

    reached.notified().await;
    resume.notify_one();
    assert!(create.await.unwrap().is_err());

    assert_eq!(h.store.len().await, 0);
    assert_eq!(h.locks.len().await, 0);
    assert_eq!(h.orders.status_of(1).await, Some(OrderStatus::ReadyForDelivery));
    assert_eq!(h.orders.status_of(2).await, Some(OrderStatus::ReadyForDelivery));
}
