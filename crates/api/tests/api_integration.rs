//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::config::Config;
use api::routes::orders::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemoryOrderRepository;
use placement::{FALLBACK_MESSAGE, InMemoryEventPublisher, InMemoryInventoryClient, PLACED_MESSAGE};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

type TestState = AppState<InMemoryOrderRepository, InMemoryInventoryClient, InMemoryEventPublisher>;

struct TestApp {
    app: Router,
    state: Arc<TestState>,
    inventory: InMemoryInventoryClient,
    publisher: InMemoryEventPublisher,
}

fn setup() -> TestApp {
    let config = Config {
        inventory_timeout: Duration::from_millis(200),
        inventory_retry_backoff: Duration::from_millis(1),
        worker_pool_size: 4,
        ..Default::default()
    };
    let inventory = InMemoryInventoryClient::with_stock([("A1", true), ("B2", false)]);
    let publisher = InMemoryEventPublisher::new();

    let state = api::create_state(
        InMemoryOrderRepository::new(),
        inventory.clone(),
        publisher.clone(),
        &config,
    );
    let app = api::create_app(state.clone(), get_metrics_handle());

    TestApp {
        app,
        state,
        inventory,
        publisher,
    }
}

fn order_body(user_id: Option<i64>, lines: &[(&str, &str, i64)]) -> serde_json::Value {
    let items: Vec<_> = lines
        .iter()
        .enumerate()
        .map(|(i, (sku, price, quantity))| {
            serde_json::json!({
                "productId": i as i64 + 1,
                "sku": sku,
                "unitPrice": price,
                "quantity": quantity,
            })
        })
        .collect();

    match user_id {
        Some(user_id) => serde_json::json!({ "userId": user_id, "items": items }),
        None => serde_json::json!({ "items": items }),
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Places an order that is expected to succeed and returns its confirmation.
async fn place(app: &Router, user_id: Option<i64>, lines: &[(&str, &str, i64)]) -> serde_json::Value {
    let response = send(app, "POST", "/order", Some(order_body(user_id, lines))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let response = send(&t.app, "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["circuit_breakers"]["inventory"], "closed");
}

#[tokio::test]
async fn test_place_order_in_stock() {
    let t = setup();

    let json = place(&t.app, Some(7), &[("A1", "10.00", 2)]).await;

    assert_eq!(json["message"], PLACED_MESSAGE);
    assert_eq!(json["totalAmount"], "20.00");
    assert!(json["orderNumber"].as_str().is_some());
    assert_eq!(t.publisher.published_count(), 1);
}

#[tokio::test]
async fn test_place_order_out_of_stock() {
    let t = setup();

    let response = send(
        &t.app,
        "POST",
        "/order",
        Some(order_body(None, &[("A1", "10.00", 1), ("B2", "5.00", 1)])),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("B2"));
    assert_eq!(t.state.repository().create_calls(), 0);
    assert_eq!(t.publisher.published_count(), 0);
}

#[tokio::test]
async fn test_place_order_invalid_quantity() {
    let t = setup();

    let response = send(
        &t.app,
        "POST",
        "/order",
        Some(order_body(None, &[("A1", "10.00", 0)])),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().is_some());
    assert_eq!(t.inventory.call_count(), 0);
}

#[tokio::test]
async fn test_place_order_inventory_down_answers_with_fallback() {
    let t = setup();
    t.inventory.set_unavailable(true);

    let response = send(
        &t.app,
        "POST",
        "/order",
        Some(order_body(None, &[("A1", "10.00", 1)])),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], FALLBACK_MESSAGE);
    assert_eq!(t.state.repository().create_calls(), 0);
}

#[tokio::test]
async fn test_get_order_by_id_and_number() {
    let t = setup();
    let placed = place(&t.app, Some(3), &[("A1", "4.50", 2)]).await;
    let order_number = placed["orderNumber"].as_str().unwrap();

    let response = send(&t.app, "GET", &format!("/order/number/{order_number}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let by_number = body_json(response).await;
    assert_eq!(by_number["status"], "CREATED");
    assert_eq!(by_number["paymentStatus"], "PENDING");
    assert_eq!(by_number["totalAmount"], "9.00");
    assert_eq!(by_number["items"][0]["sku"], "A1");
    assert_eq!(by_number["items"][0]["lineTotal"], "9.00");

    let id = by_number["id"].as_i64().unwrap();
    let response = send(&t.app, "GET", &format!("/order/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["orderNumber"], order_number);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let t = setup();

    let response = send(&t.app, "GET", "/order/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &t.app,
        "GET",
        "/order/number/8f14e45f-ceea-467f-a9f0-4a7c6e8d2b11",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_order_by_malformed_number() {
    let t = setup();

    let response = send(&t.app, "GET", "/order/number/not-a-uuid", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orders_by_user_newest_first() {
    let t = setup();
    let first = place(&t.app, Some(42), &[("A1", "1.00", 1)]).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = place(&t.app, Some(42), &[("A1", "1.00", 2)]).await;
    place(&t.app, Some(43), &[("A1", "1.00", 3)]).await;

    let response = send(&t.app, "GET", "/order/user/42", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["orderNumber"], second["orderNumber"]);
    assert_eq!(orders[1]["orderNumber"], first["orderNumber"]);

    let response = send(&t.app, "GET", "/order/user/44", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_orders() {
    let t = setup();
    place(&t.app, None, &[("A1", "1.00", 1)]).await;
    place(&t.app, None, &[("A1", "2.00", 1)]).await;

    let response = send(&t.app, "GET", "/order", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_order() {
    let t = setup();
    let placed = place(&t.app, None, &[("A1", "10.00", 1)]).await;
    let number = placed["orderNumber"].as_str().unwrap();
    let id = body_json(send(&t.app, "GET", &format!("/order/number/{number}"), None).await).await
        ["id"]
        .as_i64()
        .unwrap();

    let response = send(
        &t.app,
        "PUT",
        &format!("/order/{id}"),
        Some(serde_json::json!({
            "status": "SHIPPED",
            "paymentMethod": "CARD",
            "paymentStatus": "SUCCESS",
            "totalAmount": "0.01"
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "SHIPPED");
    assert_eq!(json["paymentMethod"], "CARD");
    assert_eq!(json["paymentStatus"], "SUCCESS");
    // Totals are fixed at placement
    assert_eq!(json["totalAmount"], "10.00");

    let response = send(
        &t.app,
        "PUT",
        "/order/999",
        Some(serde_json::json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_order() {
    let t = setup();
    let placed = place(&t.app, None, &[("A1", "10.00", 1)]).await;
    let number = placed["orderNumber"].as_str().unwrap();
    let id = body_json(send(&t.app, "GET", &format!("/order/number/{number}"), None).await).await
        ["id"]
        .as_i64()
        .unwrap();

    let response = send(&t.app, "DELETE", &format!("/order/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&t.app, "GET", &format!("/order/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&t.app, "DELETE", &format!("/order/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    place(&t.app, None, &[("A1", "10.00", 1)]).await;

    let response = send(&t.app, "GET", "/metrics", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("order_placements_total"));
}
