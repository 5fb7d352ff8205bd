use cursus_backend::{admin_init, config, migrate, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cursus_backend=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cursus backend server...");

    // Load configuration
    let config = config::Config::load()?;

    // Initialize database connection pool
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.connection_url())
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    // Run database migrations
    migrate::run_migrations(&db_pool).await?;

    // Ensure a bootstrap admin account exists
    admin_init::ensure_admin_user(&db_pool).await?;

    // Start the server
    server::start_server(config, db_pool).await?;

    info!("Server shutdown complete");
    Ok(())
}
