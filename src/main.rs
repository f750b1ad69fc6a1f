use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use mbuy_checkout::config::{init_tracing, load_config};
use mbuy_checkout::events::{create_event_channel, process_events};
use mbuy_checkout::{build_services, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level, config.log_json);

    info!(
        environment = %config.environment,
        "Starting checkout service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = db::establish_connection_from_app_config(&config).await?;
    let db = Arc::new(pool);

    if config.auto_migrate {
        db::run_migrations(&db).await?;
    }

    let (event_sender, event_rx) = create_event_channel(config.event_channel_capacity);
    tokio::spawn(process_events(event_rx));

    let services = build_services(db.clone(), &config, event_sender.clone())?;

    let cors = match &config.cors_allowed_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| {
                    let trimmed = o.trim();
                    match trimmed.parse() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!(origin = trimmed, "Ignoring unparseable CORS origin");
                            None
                        }
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        }
        None if config.is_development() => CorsLayer::permissive(),
        None => {
            warn!("No CORS origins configured outside development; denying cross-origin calls");
            CorsLayer::new()
        }
    };

    let state = AppState {
        db,
        config: Arc::new(config.clone()),
        event_sender,
        services,
    };

    let app = mbuy_checkout::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
