use film_lending::{
    adapters::{memory::InMemoryLibraryStore, postgres::PostgresLibraryStore},
    api::{handlers::AppState, router::create_router},
    application::lending::ServiceDependencies,
    config::AppConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "film_lending=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize the gateway
    let service_deps = match config.database_url.as_deref() {
        Some(database_url) => {
            tracing::info!("Using PostgreSQL gateway");

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;

            let store = PostgresLibraryStore::new(pool);
            store.migrate().await?;
            ServiceDependencies::from_gateway(Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory gateway");
            ServiceDependencies::from_gateway(Arc::new(InMemoryLibraryStore::default()))
        }
    };

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
