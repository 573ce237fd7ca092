//! API server entry point.

use api::config::{Config, parse_seed};
use domain::ProductId;
use engine::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore, ReservationStore, StockCache};
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

async fn serve<S>(store: S, cache: StockCache, config: Config, metrics_handle: PrometheusHandle)
where
    S: ReservationStore + 'static,
{
    let engine = Engine::start(store, cache.clone(), config.engine_config());
    let state = api::AppState {
        engine: engine.handle(),
        stock: cache,
    };
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting order API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Refuse new orders, then drain what was already admitted.
    engine.shutdown().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let config = Config::from_env();
    let cache = StockCache::new();
    let seed: Vec<(ProductId, u32)> = config
        .seed_stock
        .as_deref()
        .map(parse_seed)
        .unwrap_or_default()
        .into_iter()
        .map(|(product, quantity)| (ProductId::new(product), quantity))
        .collect();

    // 3. Pick the store, seed stock, warm the cache, and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store.run_migrations().await.expect("migrations failed");

            for (product, quantity) in &seed {
                store
                    .upsert_stock(product, *quantity)
                    .await
                    .expect("failed to seed stock");
            }
            cache.refresh(seed);

            serve(store, cache, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = InMemoryStore::new();

            for (product, quantity) in &seed {
                store.upsert_stock(product.clone(), *quantity).await;
            }
            cache.refresh(seed);

            serve(store, cache, config, metrics_handle).await;
        }
    }
}
