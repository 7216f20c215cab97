mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use delivery_dispatch::config::EnvironmentConfig;
use delivery_dispatch::{create_app_router, AppState};

async fn app(h: &Harness) -> Router {
    let state = AppState::new(
        EnvironmentConfig::default(),
        h.store.clone(),
        Arc::new(h.orders.clone()),
        Arc::new(h.reference.clone()),
    );
    create_app_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_body(order_ids: &[i64], vehicle_id: Option<i64>) -> Value {
    json!({
        "name": "Ruta Carchá",
        "technician_id": TECHNICIAN_ID,
        "vehicle_id": vehicle_id,
        "region_id": REGION_ID,
        "planned_date": tomorrow().to_string(),
        "tags": ["lluvia"],
        "order_ids": order_ids,
    })
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new().await;
    let (status, body) = send(&app(&h).await, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_route_flow_over_http() {
    let h = Harness::new().await;
    h.ready_orders(1, &[100, 120]).await;
    let app = app(&h).await;

    let (status, body) = send(&app, Method::POST, "/api/routes", Some(create_body(&[1, 2], Some(PICKUP)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "planned");
    assert_eq!(body["data"]["display_bucket"], "pending");
    assert_eq!(body["data"]["progress"]["total_orders"], 2);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, &format!("/api/routes/{}/start", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/routes/{}/orders/1/delivery", id),
        Some(json!({ "receiver_name": "Pedro Caal" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "delivering");

    let (status, body) = send(&app, Method::GET, &format!("/api/routes/{}/progress", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percent_complete"], 50.0);

    let (status, body) = send(&app, Method::GET, "/api/routes?state=delivering", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, Method::POST, &format!("/api/routes/{}/finish", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (status, body) = send(&app, Method::POST, &format!("/api/routes/{}/finish", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_capacity_error_body() {
    let h = Harness::new().await;
    h.ready_orders(1, &[200, 200, 200]).await;
    let app = app(&h).await;

    let (status, body) = send(&app, Method::POST, "/api/routes", Some(create_body(&[1, 2, 3], Some(SMALL_TRUCK)))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");
    assert_eq!(body["details"]["dimension"], "weight");
}

#[tokio::test]
async fn test_not_found_and_bad_state_filter() {
    let h = Harness::new().await;
    let app = app(&h).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/routes/00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, Method::GET, "/api/routes?state=flying", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_planned_route() {
    let h = Harness::new().await;
    h.ready_orders(1, &[100]).await;
    let app = app(&h).await;

    let (_, body) = send(&app, Method::POST, "/api/routes", Some(create_body(&[1], None))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::DELETE, &format!("/api/routes/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, Method::GET, &format!("/api/routes/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_statistics_and_logistics_endpoints() {
    let h = Harness::new().await;
    h.ready_orders(1, &[100, 100, 100]).await;
    let app = app(&h).await;

    let (_, body) = send(&app, Method::POST, "/api/routes", Some(create_body(&[1, 2], Some(PICKUP)))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    send(&app, Method::POST, &format!("/api/routes/{}/start", id), None).await;
    send(
        &app,
        Method::POST,
        &format!("/api/routes/{}/orders/2/delivery", id),
        Some(json!({ "receiver_name": "Rosa Tzi", "notes": "Dejado con vecina" })),
    )
    .await;

    let (status, stats) = send(&app, Method::GET, &format!("/api/routes/statistics?region={}", REGION_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["active_routes"], 1);
    assert_eq!(stats["unassigned_orders"], 1);
    assert_eq!(stats["deliveries_completed_today"], 1);
    assert_eq!(stats["vehicles_total"], 2);
    assert_eq!(stats["vehicles_available"], 1);

    let (status, orders) = send(&app, Method::GET, "/api/logistics/ready-orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, vehicles) = send(&app, Method::GET, "/api/logistics/vehicles?active_only=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicles.as_array().unwrap().len(), 2);

    let (status, regions) = send(&app, Method::GET, "/api/logistics/regions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(regions[0]["name"], "Alta Verapaz");
}
