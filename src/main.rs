use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod cron;
mod db;
mod errors;
mod http;
mod middleware;
mod models;
mod paging;
mod routes;
mod services;
mod state;
mod templates;

#[cfg(test)]
mod testing;

use services::{bucket::AvatarStorage, members::MySqlMemberRepository};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────
    let config = config::Config::from_env()?;

    // ── Logging ───────────────────────────────────────────────
    let default_filter = format!(
        "frame={},tower_http={}",
        config.log_level,
        if config.debug { "debug" } else { "info" },
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(app = %config.app_name, debug = config.debug, "Starting");

    // ── Database ──────────────────────────────────────────────
    let pool = db::connect(&config).await?;
    db::run_migrations(&pool).await?;
    auth::seed::seed_reference_data(&pool).await?;

    // ── Templates and storage ─────────────────────────────────
    let templates = templates::Templates::load(&config)?;
    let avatars = AvatarStorage::from_config(&config)?;
    if config.bucket_enabled() {
        tracing::info!(url = %config.gobucket_url, "Avatars stored in external bucket");
    } else {
        tracing::info!("Avatars stored on local disk");
    }

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let app_state = AppState::new(config, Arc::new(MySqlMemberRepository::new(pool)), templates, avatars);

    // ── Background jobs ───────────────────────────────────────
    let mut scheduler = cron::Scheduler::new();
    cron::register_member_purge(&mut scheduler, &app_state)?;
    scheduler.start();

    // ── Router ────────────────────────────────────────────────
    let app = routes::build_router(app_state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
