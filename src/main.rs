use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use axum::http::header::STRICT_TRANSPORT_SECURITY;
use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use library_catalog::{
    AppState, Backend, Config, Permission,
    cache::MemoryCache,
    clock::SystemClock,
    hash_password,
    repository::{CatalogRepository, InMemoryCatalog, PgCatalog},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,library_catalog=debug,sqlx=warn".into()),
        )
        .json()
        .init();

    info!("Starting library catalog v{}", env!("CARGO_PKG_VERSION"));

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let catalog: Arc<dyn CatalogRepository> = match config.backend {
        Backend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;
            let db = connect_with_retry(url)
                .await
                .map_err(|e| anyhow!("Failed to connect to PostgreSQL after retries: {e}"))?;

            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db)
                .await
                .map_err(|e| anyhow!("Migration failed: {e}"))?;
            info!("Database migrations completed successfully");
            Arc::new(PgCatalog::new(db))
        }
        Backend::Memory => {
            warn!("Using the in-memory catalog; records are lost on shutdown");
            Arc::new(InMemoryCatalog::new())
        }
    };

    ensure_librarian(catalog.as_ref(), &config).await?;

    let state = Arc::new(AppState::new(
        config.clone(),
        catalog,
        Arc::new(MemoryCache::new()),
        Arc::new(SystemClock),
    )?);

    let hsts_value: HeaderValue =
        HeaderValue::from_static("max-age=63072000; includeSubDomains; preload");

    let app = routes::router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            tower_http::set_header::SetResponseHeaderLayer::if_not_present(
                STRICT_TRANSPORT_SECURITY,
                hsts_value,
            ),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {e}"))?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Create the configured librarian account on first start.
async fn ensure_librarian(catalog: &dyn CatalogRepository, config: &Config) -> Result<()> {
    let Some(creds) = &config.librarian else {
        return Ok(());
    };
    if catalog.find_user_by_username(&creds.username).await?.is_some() {
        return Ok(());
    }
    let hash = hash_password(&creds.password)?;
    let permissions: Vec<String> = Permission::ALL
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    catalog
        .create_user(&creds.username, &hash, &permissions)
        .await?;
    info!(username = %creds.username, "librarian account created");
    Ok(())
}

async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut delay = Duration::from_millis(500);
    let max_attempts = 30;
    let mut attempt = 1;

    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!("Connected to PostgreSQL on attempt {attempt}");
                return Ok(pool);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    "Database connection failed (attempt {}/{}): {e}, retrying in {:?}",
                    attempt, max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
                attempt += 1;
            }
            Err(e) => {
                error!("All connection attempts failed");
                return Err(e);
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }

    info!("Shutdown signal received, closing server...");
}
