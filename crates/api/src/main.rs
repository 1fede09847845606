//! API server entry point.

use api::config::{Config, LogFormat};
use domain::LogNotifier;
use order_store::{Contact, InMemoryStore, Money, PostgresStore, UserId};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Stocks the in-memory catalog so a local run has something to sell.
async fn seed_demo_catalog(store: &InMemoryStore) -> Result<(), order_store::StoreError> {
    let laddu = store.add_product("Besan Laddu").await;
    store
        .add_product_weight(laddu, "250", "g", Money::from_cents(3000), 50)
        .await?;
    store
        .add_product_weight(laddu, "500", "g", Money::from_cents(5000), 50)
        .await?;

    let barfi = store.add_product("Kaju Barfi").await;
    store
        .add_product_weight(barfi, "500", "g", Money::from_cents(7500), 20)
        .await?;
    store
        .add_product_weight(barfi, "1", "kg", Money::from_cents(14000), 10)
        .await?;

    store
        .add_contact(Contact {
            user_id: UserId::new(1),
            first_name: "Demo".to_string(),
            contact_number: "+10000000000".to_string(),
        })
        .await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the store and build the application
    let app = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");

            let state = api::create_default_state(store, LogNotifier, config.dedup_window());
            api::create_app(state, metrics_handle)
        }
        None => {
            let store = InMemoryStore::new();
            seed_demo_catalog(&store)
                .await
                .expect("failed to seed demo catalog");
            tracing::warn!("DATABASE_URL not set, using in-memory store with a demo catalog");

            let state = api::create_default_state(store, LogNotifier, config.dedup_window());
            api::create_app(state, metrics_handle)
        }
    };

    // 4. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
