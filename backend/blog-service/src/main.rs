use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use blog_service::db::{
    create_pool, PgCommentRepository, PgPostRepository, PgPostTagRepository, PgTagRepository,
};
use blog_service::handlers::{self, AppState};
use blog_service::middleware::TokenVerifier;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Blog Service
///
/// Serves posts, comments, tags and post/tag links over HTTP, backed by
/// PostgreSQL.
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match blog_service::Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        env = %config.app.env,
        store_timeout_ms = config.store.timeout_ms,
        request_timeout_ms = config.store.request_timeout_ms,
        "Starting blog-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(&config.database)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database: {e}")))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = web::Data::new(AppState {
        posts: Arc::new(PgPostRepository::new(pool.clone())),
        comments: Arc::new(PgCommentRepository::new(pool.clone())),
        tags: Arc::new(PgTagRepository::new(pool.clone())),
        post_tags: Arc::new(PgPostTagRepository::new(pool.clone())),
        store_timeout: config.store.timeout(),
        request_timeout: config.store.request_timeout(),
        shutdown: shutdown_rx,
    });
    let verifier = web::Data::new(TokenVerifier::new(&config.auth.jwt_secret));

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(verifier.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = actix_rt::spawn(server);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    // In-flight store round trips are abandoned and report a server failure
    let _ = shutdown_tx.send(true);
    server_handle.stop(true).await;

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!("HTTP server task failed: {}", e),
    }

    pool.close().await;
    tracing::info!("blog-service stopped");
    Ok(())
}
