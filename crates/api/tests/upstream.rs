//! Adapters against a local stand-in for the product, pricing and store service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use poolchat_agent::specialists::{PricingService, ProductCatalog, StoreDirectory};
use poolchat_api::services::{HttpPricingService, HttpProductCatalog, HttpStoreDirectory};
use poolchat_api::{check_health, RestClient, RetryPolicy};
use poolchat_core::config::AppConfig;
use poolchat_core::domain::intent::{Coordinates, PricingItem};
use poolchat_core::errors::SpecialistError;
use serde_json::{json, Value};

#[derive(Default)]
struct Upstream {
    pricing_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    customer_ids: Mutex<Vec<String>>,
    pricing_bodies: Mutex<Vec<Value>>,
    store_queries: Mutex<Vec<HashMap<String, String>>>,
}

async fn pricing(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let attempt = upstream.pricing_calls.fetch_add(1, Ordering::SeqCst);
    let customer = headers
        .get("x-customer-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    upstream.customer_ids.lock().expect("lock").push(customer);
    upstream.pricing_bodies.lock().expect("lock").push(body);

    if attempt == 0 {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "pricing warming up"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "customerId": "HPTA",
            "items": [
                {"item_code": "LZA406103A", "unit": "EA", "price": "599.99", "in_stock": true}
            ]
        })),
    )
}

async fn product_detail(
    State(upstream): State<Arc<Upstream>>,
    Path(part_number): Path<String>,
) -> (StatusCode, Json<Value>) {
    upstream.detail_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, Json(json!({"detail": format!("Product {part_number} not found")})))
}

async fn store_search(
    State(upstream): State<Arc<Upstream>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.store_queries.lock().expect("lock").push(params);
    Json(json!({
        "stores": [{"store_id": "123", "name": "Miami Branch", "distance_miles": 2.4}],
        "total_results": 1,
        "page": 1
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn serve(upstream: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/api/pricing", post(pricing))
        .route("/api/products/{part_number}", get(product_detail))
        .route("/api/stores/search", get(store_search))
        .route("/health", get(health))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream");
    });
    format!("http://{address}")
}

fn client(base_url: String) -> Arc<RestClient> {
    let mut config = AppConfig::default().api;
    config.base_url = base_url;
    let client = RestClient::new(&config).expect("client builds").with_retry_policy(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    });
    Arc::new(client)
}

#[tokio::test]
async fn pricing_retries_a_server_error_and_sends_account_headers() {
    let upstream = Arc::new(Upstream::default());
    let rest = client(serve(Arc::clone(&upstream)).await);
    let service = HttpPricingService::new(rest);

    let quotes = service
        .price(&[PricingItem::new("LZA406103A", None)])
        .await
        .expect("second attempt succeeds");

    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].item_code, "LZA406103A");
    assert_eq!(quotes[0].price.map(|price| price.to_string()).as_deref(), Some("599.99"));
    assert!(quotes[0].in_stock);
    assert_eq!(upstream.pricing_calls.load(Ordering::SeqCst), 2);
    assert_eq!(*upstream.customer_ids.lock().expect("lock"), vec!["HPTA", "HPTA"]);
    let body = upstream.pricing_bodies.lock().expect("lock")[0].clone();
    assert_eq!(body, json!({"items": [{"item_code": "LZA406103A", "unit": "EA"}]}));
}

#[tokio::test]
async fn missing_product_is_not_retried() {
    let upstream = Arc::new(Upstream::default());
    let rest = client(serve(Arc::clone(&upstream)).await);
    let catalog = HttpProductCatalog::new(rest);

    let error = catalog.detail("NOPE123").await.expect_err("404 surfaces");

    assert!(matches!(error, SpecialistError::NotFound(_)), "got {error:?}");
    assert_eq!(upstream.detail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn store_search_sends_coordinates_and_paging() {
    let upstream = Arc::new(Upstream::default());
    let rest = client(serve(Arc::clone(&upstream)).await);
    let directory = HttpStoreDirectory::new(rest);
    let miami = Coordinates::new(25.7617, -80.1918).expect("valid");

    let result = directory.search(miami, 50, 1, 10).await.expect("stores");

    assert_eq!(result.stores[0].store_id, "123");
    let queries = upstream.store_queries.lock().expect("lock");
    assert_eq!(queries[0].get("latitude").map(String::as_str), Some("25.7617"));
    assert_eq!(queries[0].get("radius").map(String::as_str), Some("50"));
    assert_eq!(queries[0].get("page_size").map(String::as_str), Some("10"));
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let upstream = Arc::new(Upstream::default());
    let rest = client(serve(upstream).await);

    let report = check_health(&rest).await.expect("health");

    assert!(report.is_healthy());
}

#[tokio::test]
async fn unreachable_upstream_is_unavailable() {
    let rest = client("http://127.0.0.1:9".to_owned());
    let service = HttpPricingService::new(rest);

    let error = service.price(&[PricingItem::new("LZA406103A", None)]).await.expect_err("refused");

    assert!(matches!(error, SpecialistError::Unavailable(_)), "got {error:?}");
}
