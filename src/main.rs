use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use cropmate_api::auth::{AuthConfig, AuthService};
use cropmate_api::config;
use cropmate_api::db;
use cropmate_api::events::{self, EventSender};
use cropmate_api::handlers::AppServices;
use cropmate_api::storage::{FailingObjectStorage, HttpObjectStorage, ObjectStorage};
use cropmate_api::{api_v1_routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!(
        environment = %app_config.environment,
        "Starting CropMate API v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = db::establish_connection_from_app_config(&app_config).await?;
    if app_config.auto_migrate {
        db::run_migrations(&db_pool).await?;
    }
    let db_pool = Arc::new(db_pool);

    // Event channel; the consumer only logs for now.
    let (event_tx, event_rx) = mpsc::channel(1024);
    tokio::spawn(events::process_events(event_rx));
    let event_sender = EventSender::new(event_tx);

    let auth_service = Arc::new(AuthService::new(AuthConfig::new(
        app_config.jwt_secret.clone(),
        app_config.auth_issuer.clone(),
        app_config.auth_audience.clone(),
        Duration::from_secs(app_config.jwt_expiration as u64),
    )));

    let storage: Arc<dyn ObjectStorage> = match &app_config.storage_upload_url {
        Some(url) => Arc::new(HttpObjectStorage::new(
            url.clone(),
            app_config.storage_upload_preset.clone(),
        )),
        None => {
            warn!("No storage_upload_url configured; payment proof uploads will fail");
            Arc::new(FailingObjectStorage)
        }
    };

    let services = AppServices::new(
        db_pool.clone(),
        storage,
        Arc::new(event_sender.clone()),
    );

    let state = AppState {
        db: db_pool,
        config: app_config.clone(),
        event_sender,
        auth_service,
        services,
    };

    let app = Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", app_config.host, app_config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    info!("Server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
