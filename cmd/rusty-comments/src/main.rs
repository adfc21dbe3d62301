//! # rusty-comments
//!
//! Assembles the server from configuration: storage, edit-token keys, the
//! comment service and the HTTP router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use api_adapters::AppState;
use auth_adapters::CookieGuard;
use axum::Router;
use configs::{AppConfig, LogConfig, LogFormat};
use services::{AuthorHasher, CommentService, EscapingRenderer, ModerationPolicy};
use storage_adapters::SqliteCommentRepo;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_logging(&config.log);

    let repo = SqliteCommentRepo::connect(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("opening database {}", config.database.path))?;
    repo.check_ready().await.context("database not ready")?;
    let repo = Arc::new(repo);

    let guard = CookieGuard::from_store(repo.as_ref(), config.guard.edit_max_age_secs)
        .await
        .context("loading cookie keys")?;

    let policy = ModerationPolicy {
        enabled: config.moderation.enabled,
        approve_acquaintance: config.moderation.approve_acquaintance,
    };
    tracing::info!(
        moderation = policy.enabled,
        approve_acquaintance = policy.approve_acquaintance,
        hosts = ?config.server.hosts,
        "configuration loaded"
    );

    let service = CommentService::new(
        repo,
        Arc::new(guard),
        Arc::new(EscapingRenderer),
        policy,
        AuthorHasher::new(config.hash.salt),
    );
    let state = AppState::new(
        Arc::new(service),
        config.server.hosts,
        config.guard.edit_max_age_secs,
    );
    let app = api_adapters::router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    serve(config.server.listen, app).await
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
    tracing::info!(service = env!("CARGO_PKG_NAME"), "logging initialized");
}

async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}
