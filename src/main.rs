// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use token_gate::{
    api::router,
    blockchain::{format_token_balance, ChainBalanceOracle, ChainClientError, OwnershipVerifier},
    bot::UpdatePoller,
    config::{self, ConfigError, GateConfig, LogFormat, DEFAULT_LOG_FILTER},
    group::TelegramGroup,
    lifecycle::MembershipLifecycle,
    providers::telegram::{TelegramClient, TelegramError},
    scheduler::AuditScheduler,
    state::AppState,
    storage::{MemberDatabase, MemberDbError},
    tls::{load_tls_config, TlsError},
};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("data directory: {0}")]
    DataDir(#[source] std::io::Error),

    #[error("listener: {0}")]
    Serve(#[source] std::io::Error),

    #[error("member database: {0}")]
    Store(#[from] MemberDbError),

    #[error("chain client: {0}")]
    Chain(#[from] ChainClientError),

    #[error("telegram client: {0}")]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    init_tracing(config::log_format());

    if let Err(e) = run().await {
        error!(error = %e, "Token gate exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = GateConfig::from_env()?;

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    std::fs::create_dir_all(&config.data_dir).map_err(StartupError::DataDir)?;
    let store = Arc::new(MemberDatabase::open_in(&config.data_dir)?);
    info!(
        data_dir = %config.data_dir.display(),
        members = store.count()?,
        "Member database opened"
    );

    let oracle = ChainBalanceOracle::new(config.token.clone())?;
    oracle.check_decimals().await;
    info!(
        rpc_url = %config.token.rpc_url,
        token = %config.token.token_contract,
        required = %format_token_balance(config.token.threshold, config.token.decimals),
        "Balance oracle ready"
    );

    let telegram = Arc::new(TelegramClient::new(
        &config.telegram.api_base_url,
        &config.telegram.bot_token,
    )?);
    let group = TelegramGroup::new(telegram.clone(), config.telegram.group_chat_id);

    let lifecycle = Arc::new(MembershipLifecycle::new(
        OwnershipVerifier::new(config.challenge.clone()),
        oracle,
        group,
        store,
        config.lifecycle,
    ));

    let tls_config = match &config.server.tls {
        Some(paths) => Some(load_tls_config(paths).await?),
        None => None,
    };

    let shutdown = CancellationToken::new();

    let scheduler = AuditScheduler::new(lifecycle.clone(), config.audit_time);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    let poller = UpdatePoller::new(telegram, config.telegram.verify_page_url.clone());
    let poller_task = tokio::spawn(poller.run(shutdown.clone()));

    let app = router(AppState::new(lifecycle));

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let addr = config.server.bind_addr;
    let served = match tls_config {
        Some(tls_config) => {
            info!("Token gate listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Token gate listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    // Stop background work even if the listener failed on its own.
    shutdown.cancel();
    let _ = tokio::join!(scheduler_task, poller_task);
    served.map_err(StartupError::Serve)?;

    info!("Token gate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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
}
