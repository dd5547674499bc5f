//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use market_store::InMemoryMarketStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
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

fn setup() -> (Router, Arc<AppState<InMemoryMarketStore>>) {
    let state = Arc::new(AppState::new(InMemoryMarketStore::new()));
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, username: &str, password: &str) -> (String, Value) {
    let (status, json) = send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
    (json["token"].as_str().unwrap().to_string(), json["user"].clone())
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {json}");
    json["token"].as_str().unwrap().to_string()
}

/// Seeds an admin and an organizer; returns the organizer's token and user.
async fn organizer(app: &Router, state: &AppState<InMemoryMarketStore>) -> (String, Value) {
    state
        .market
        .bootstrap_admin("admin", "admin123")
        .await
        .unwrap();
    let admin = login(app, "admin", "admin123").await;
    let (status, user) = send(
        app,
        "POST",
        "/staff",
        Some(&admin),
        Some(json!({ "username": "org", "password": "orgpass", "role": "organizer" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create staff failed: {user}");
    (login(app, "org", "orgpass").await, user)
}

async fn create_event(app: &Router, token: &str, supply: u32) -> Value {
    let (status, event) = send(
        app,
        "POST",
        "/events",
        Some(token),
        Some(json!({
            "name": "Summer Fest",
            "symbol": "sumr",
            "date": "2026-07-01",
            "wholesale_price_cents": 4000,
            "max_resale_price_cents": 6000,
            "supply": supply,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create event failed: {event}");
    event
}

async fn top_up(app: &Router, token: &str, amount_cents: i64) {
    let (status, json) = send(
        app,
        "POST",
        "/wallet/top-up",
        Some(token),
        Some(json!({ "amount_cents": amount_cents })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "top-up failed: {json}");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_register_and_login() {
    let (app, _) = setup();

    let (token, user) = register(&app, "alice", "alicepw").await;
    assert_eq!(user["role"], "customer");
    assert_eq!(user["balance"], 0);
    assert!(user.get("password_hash").is_none());
    assert!(user["wallet"].as_str().unwrap().starts_with("0x"));

    let (status, dashboard) = send(&app, "GET", "/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["role"], "customer");

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "alice", "password": "another" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_authenticated_routes_require_session() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/wallet", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/wallet", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = register(&app, "alice", "alicepw").await;
    let (status, _) = send(&app, "POST", "/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/wallet", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_cannot_create_staff_or_events() {
    let (app, _) = setup();
    let (token, _) = register(&app, "alice", "alicepw").await;

    let (status, _) = send(
        &app,
        "POST",
        "/staff",
        Some(&token),
        Some(json!({ "username": "sneaky", "password": "pass1", "role": "organizer" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/events",
        Some(&token),
        Some(json!({
            "name": "Nope",
            "symbol": "NOPE",
            "date": "2026-01-01",
            "wholesale_price_cents": 100,
            "max_resale_price_cents": 100,
            "supply": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_issue_and_buy_ticket() {
    let (app, state) = setup();
    let (org_token, org) = organizer(&app, &state).await;
    let event = create_event(&app, &org_token, 3).await;
    assert_eq!(event["symbol"], "SUMR");
    let event_id = event["id"].as_str().unwrap();

    let (status, detail) = send(&app, "GET", &format!("/events/{event_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["total"], 3);
    assert_eq!(detail["offers"][0]["seller"], org["wallet"]);

    let (_, offered) = send(&app, "GET", &format!("/events/{event_id}/tickets"), None, None).await;
    let ticket_id = offered[0]["id"].as_str().unwrap().to_string();

    let (buyer, _) = register(&app, "alice", "alicepw").await;
    top_up(&app, &buyer, 5000).await;

    let (status, entry) = send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/purchase"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "purchase failed: {entry}");
    assert_eq!(entry["kind"], "PURCHASE");
    assert_eq!(entry["amount"], 4000);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/purchase"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, wallet) = send(&app, "GET", "/wallet", Some(&buyer), None).await;
    assert_eq!(wallet["balance"], 1000);
    assert_eq!(wallet["entries"].as_array().unwrap().len(), 2);

    let (_, orders) = send(&app, "GET", "/orders", Some(&buyer), None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["ticket_count"], 1);
    assert_eq!(orders[0]["events"][0], "Summer Fest");

    let (_, ledger) = send(&app, "GET", "/ledger", None, None).await;
    let kinds: Vec<&str> = ledger
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["PURCHASE", "TOPUP", "MINT"]);
}

#[tokio::test]
async fn test_purchase_without_funds_is_unprocessable() {
    let (app, state) = setup();
    let (org_token, _) = organizer(&app, &state).await;
    let event = create_event(&app, &org_token, 1).await;
    let event_id = event["id"].as_str().unwrap();
    let (_, offered) = send(&app, "GET", &format!("/events/{event_id}/tickets"), None, None).await;
    let ticket_id = offered[0]["id"].as_str().unwrap();

    let (buyer, _) = register(&app, "alice", "alicepw").await;
    top_up(&app, &buyer, 100).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/purchase"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("Insufficient funds"));
}

#[tokio::test]
async fn test_oversized_top_up_is_a_bad_request() {
    let (app, _) = setup();
    let (buyer, _) = register(&app, "alice", "alicepw").await;
    top_up(&app, &buyer, 100).await;

    let (status, json) = send(
        &app,
        "POST",
        "/wallet/top-up",
        Some(&buyer),
        Some(json!({ "amount_cents": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");

    let (status, wallet) = send(&app, "GET", "/wallet", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["balance"], json!(100));
}

#[tokio::test]
async fn test_resale_respects_price_cap() {
    let (app, state) = setup();
    let (org_token, _) = organizer(&app, &state).await;
    let event = create_event(&app, &org_token, 1).await;
    let event_id = event["id"].as_str().unwrap();
    let (_, offered) = send(&app, "GET", &format!("/events/{event_id}/tickets"), None, None).await;
    let ticket_id = offered[0]["id"].as_str().unwrap().to_string();

    let (buyer, buyer_user) = register(&app, "alice", "alicepw").await;
    top_up(&app, &buyer, 4000).await;
    send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/purchase"),
        Some(&buyer),
        None,
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/list"),
        Some(&buyer),
        Some(json!({ "price_cents": 7000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, ticket) = send(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/list"),
        Some(&buyer),
        Some(json!({ "price_cents": 5500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["status"], "listed");

    let wallet = buyer_user["wallet"].as_str().unwrap();
    let (status, front) = send(&app, "GET", &format!("/market/{wallet}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(front["listings"][0]["price"], 5500);
    assert_eq!(front["listings"][0]["count"], 1);
}

#[tokio::test]
async fn test_cart_checkout() {
    let (app, state) = setup();
    let (org_token, org) = organizer(&app, &state).await;
    let event = create_event(&app, &org_token, 5).await;

    let (buyer, _) = register(&app, "alice", "alicepw").await;
    top_up(&app, &buyer, 20_000).await;

    let (status, item) = send(
        &app,
        "POST",
        "/cart",
        Some(&buyer),
        Some(json!({
            "event_id": event["id"],
            "seller": org["wallet"],
            "unit_price_cents": 4000,
            "quantity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add to cart failed: {item}");

    let (_, cart) = send(&app, "GET", "/cart", Some(&buyer), None).await;
    assert_eq!(cart["total"], 12_000);
    assert_eq!(cart["lines"][0]["event_name"], "Summer Fest");

    let (status, receipt) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {receipt}");
    assert_eq!(receipt["total"], 12_000);
    assert_eq!(receipt["entries"].as_array().unwrap().len(), 3);

    let (status, _) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, dashboard) = send(&app, "GET", "/dashboard", Some(&buyer), None).await;
    assert_eq!(dashboard["holdings"][0]["owned"], 3);
}

#[tokio::test]
async fn test_disabled_account_loses_session() {
    let (app, state) = setup();
    let (org_token, org) = organizer(&app, &state).await;
    let admin = login(&app, "admin", "admin123").await;

    let org_id = org["id"].as_str().unwrap();
    let (status, toggled) = send(
        &app,
        "POST",
        &format!("/users/{org_id}/toggle"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["active"], false);

    let (status, _) = send(&app, "GET", "/dashboard", Some(&org_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "org", "password": "orgpass" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_path_ids_are_bad_requests() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/tickets/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("ticket id"));

    let (status, _) = send(&app, "GET", "/market/0x1234", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    register(&app, "alice", "alicepw").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}
