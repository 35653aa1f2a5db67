//! HTTP inventory client against a throwaway axum server.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use domain::Sku;
use placement::{HttpInventoryClient, InventoryClient, InventoryError, StockAvailability};

type Stock = Arc<HashMap<String, bool>>;

async fn inventory(
    State(stock): State<Stock>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let answer: Vec<StockAvailability> = params
        .into_iter()
        .filter(|(key, _)| key == "sku")
        .filter_map(|(_, sku)| {
            stock
                .get(&sku)
                .map(|in_stock| StockAvailability::new(sku.as_str(), *in_stock))
        })
        .collect();
    Json(answer).into_response()
}

async fn start_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_inventory(levels: &[(&str, bool)]) -> String {
    let stock: Stock = Arc::new(
        levels
            .iter()
            .map(|(sku, in_stock)| (sku.to_string(), *in_stock))
            .collect(),
    );
    start_server(
        Router::new()
            .route("/inventory", get(inventory))
            .with_state(stock),
    )
    .await
}

fn skus(codes: &[&str]) -> BTreeSet<Sku> {
    codes.iter().map(|c| Sku::new(*c)).collect()
}

fn client(base_url: impl Into<String>) -> HttpInventoryClient {
    // Local test servers must not be routed through an ambient proxy
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpInventoryClient::with_client(http, base_url)
}

const DEADLINE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn batched_lookup_returns_known_skus() {
    let base_url = start_inventory(&[("A1", true), ("B2", false)]).await;
    let client = client(format!("{base_url}/"));

    let mut answer = client
        .check_stock(&skus(&["A1", "B2", "C3"]), DEADLINE)
        .await
        .unwrap();
    answer.sort_by(|a, b| a.sku.cmp(&b.sku));

    assert_eq!(
        answer,
        vec![
            StockAvailability::new("A1", true),
            StockAvailability::new("B2", false)
        ]
    );
    assert_eq!(client.base_url(), base_url);
}

#[tokio::test]
async fn server_error_is_transport_failure() {
    let base_url = start_server(Router::new().route(
        "/inventory",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;
    let client = client(base_url);

    let result = client.check_stock(&skus(&["A1"]), DEADLINE).await;

    assert!(matches!(result, Err(InventoryError::Transport(_))));
}

#[tokio::test]
async fn client_error_is_rejected() {
    let base_url = start_server(Router::new()).await;
    let client = client(base_url);

    let result = client.check_stock(&skus(&["A1"]), DEADLINE).await;

    assert_eq!(result, Err(InventoryError::Rejected(404)));
}

#[tokio::test]
async fn malformed_body_is_decode_failure() {
    let base_url = start_server(Router::new().route(
        "/inventory",
        get(|| async { "definitely not json" }),
    ))
    .await;
    let client = client(base_url);

    let result = client.check_stock(&skus(&["A1"]), DEADLINE).await;

    assert!(matches!(result, Err(InventoryError::Decode(_))));
}

#[tokio::test]
async fn slow_server_times_out() {
    let base_url = start_server(Router::new().route(
        "/inventory",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(Vec::<StockAvailability>::new())
        }),
    ))
    .await;
    let client = client(base_url);

    let result = client
        .check_stock(&skus(&["A1"]), Duration::from_millis(100))
        .await;

    assert_eq!(result, Err(InventoryError::Timeout));
}

#[tokio::test]
async fn unreachable_host_is_transport_failure() {
    // Bind and drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(format!("http://{addr}"));

    let result = client.check_stock(&skus(&["A1"]), DEADLINE).await;

    assert!(matches!(result, Err(InventoryError::Transport(_))));
}
