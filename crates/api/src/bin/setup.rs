//! One-time database setup: applies migrations and seeds the admin account.

use api::config::Config;
use market_store::PostgresMarketStore;
use marketplace::Marketplace;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(url) = config.database_url.as_deref() else {
        tracing::error!("DATABASE_URL must be set");
        std::process::exit(1);
    };

    let store = PostgresMarketStore::connect(url, config.database_max_connections)
        .await
        .expect("failed to connect to database");
    store
        .run_migrations()
        .await
        .expect("failed to run migrations");

    let market = Marketplace::new(store);
    match market
        .bootstrap_admin(&config.admin_username, &config.admin_password)
        .await
    {
        Ok(Some(admin)) => {
            tracing::info!(username = %admin.username, wallet = %admin.wallet, "admin account created");
        }
        Ok(None) => tracing::info!("admin account already exists, nothing to do"),
        Err(e) => {
            tracing::error!(error = %e, "failed to create admin account");
            std::process::exit(1);
        }
    }
}
