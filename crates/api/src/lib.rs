//! HTTP API server for the ticket marketplace.
//!
//! Exposes accounts, event issuance, trading, carts, wallets and the read
//! models as JSON endpoints, with bearer-token sessions, structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use market_store::MarketStore;
use marketplace::Marketplace;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use views::MarketViews;

use session::SessionStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub market: Marketplace<S>,
    pub views: MarketViews<S>,
    pub sessions: SessionStore,
}

impl<S: MarketStore + Clone> AppState<S> {
    /// Builds the services over one shared store.
    pub fn new(store: S) -> Self {
        Self {
            market: Marketplace::new(store.clone()),
            views: MarketViews::new(store),
            sessions: SessionStore::new(),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{accounts, cart, dashboard, events, ledger, market, tickets, wallet};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Accounts
        .route("/register", post(accounts::register::<S>))
        .route("/login", post(accounts::login::<S>))
        .route("/logout", post(accounts::logout::<S>))
        .route("/account/password", post(accounts::change_password::<S>))
        .route("/staff", post(accounts::create_staff::<S>))
        .route("/users/{id}/toggle", post(accounts::toggle_active::<S>))
        .route("/users/{id}", delete(accounts::delete_user::<S>))
        .route("/dashboard", get(dashboard::get::<S>))
        // Events and tickets
        .route("/events", get(events::list::<S>).post(events::create::<S>))
        .route("/events/{id}", get(events::get::<S>))
        .route("/events/{id}/tickets", get(events::tickets::<S>))
        .route("/tickets/bulk-list", post(tickets::bulk_list::<S>))
        .route("/tickets/bulk-acquire", post(tickets::bulk_acquire::<S>))
        .route("/tickets/{id}", get(tickets::get::<S>))
        .route("/tickets/{id}/list", post(tickets::list::<S>))
        .route("/tickets/{id}/purchase", post(tickets::purchase::<S>))
        .route("/market/{wallet}", get(market::storefront::<S>))
        // Money
        .route("/wallet", get(wallet::history::<S>))
        .route("/wallet/top-up", post(wallet::top_up::<S>))
        .route("/wallet/withdraw", post(wallet::withdraw::<S>))
        .route("/cart", get(cart::get::<S>).post(cart::add::<S>))
        .route("/cart/checkout", post(cart::checkout::<S>))
        .route("/cart/{id}", delete(cart::remove::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/ledger", get(ledger::public::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
