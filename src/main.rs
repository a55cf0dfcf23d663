use axum::extract::DefaultBodyLimit;
use smartrecruiter_backend::{
    config::{get_config, init_config, LogFormat},
    database::pool::{create_pool, run_migrations},
    middleware::cors::credentialed_cors,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    info!("Database migrations applied");

    let app_state = AppState::new(pool, config)?;

    {
        let sessions = app_state.session_service.clone();
        let every = Duration::from_secs(config.session_sweep_secs.max(1));
        tokio::spawn(async move {
            loop {
                if let Err(e) = sessions.sweep_expired().await {
                    tracing::error!(error = ?e, "session sweeper failed");
                }
                tokio::time::sleep(every).await;
            }
        });
    }

    let app = routes::app_router(app_state, config.api_rps, config.public_rps)
        .layer(credentialed_cors(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
