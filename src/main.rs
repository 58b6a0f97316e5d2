// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use classroom_server::{
    api::router,
    config::{Settings, LOG_FORMAT_ENV},
    gateway::TelegramGateway,
    reminders::{ReminderScheduler, SystemClock},
    state::AppState,
    storage::Database,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    info!("Starting classroom server v{}", env!("CARGO_PKG_VERSION"));

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let database_path = settings.database_path();
    let db = Arc::new(Database::open(&database_path).expect("Failed to open database"));
    info!(path = %database_path.display(), "Database opened");

    let gateway = Arc::new(
        TelegramGateway::new(&settings.telegram_api_base_url, &settings.bot_token)
            .expect("Failed to build Telegram gateway"),
    );
    let clock = Arc::new(SystemClock);

    // Background reminder scheduler
    let shutdown = CancellationToken::new();
    let scheduler = ReminderScheduler::new(
        db.clone(),
        gateway.clone(),
        clock.clone(),
        settings.reminders.clone(),
    )
    .with_web_app_url(settings.web_app_url().map(str::to_string));
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .expect("Failed to parse bind address");

    let state = AppState::new(db, settings, gateway, clock);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Classroom server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .expect("HTTP server failed");

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Reminder scheduler task failed");
    }
    info!("Shutdown complete");
}

/// `RUST_LOG` filter (default `info,tower_http=debug`); `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on ctrl-c or SIGTERM, then cancels background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
    shutdown.cancel();
}
