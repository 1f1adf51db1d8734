//! Process lifecycle: storage bootstrap, sweeper, HTTP server, shutdown.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pasteconf::{PasteConfig, StorageBackend};
use pastestore::{MemoryBackend, PasteService, PasteStore, Sweeper};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::settings::RuntimeSettings;
use crate::web::{self, AppState};

/// Connect to the configured backend, creating the bucket if needed.
///
/// Bounded by the request timeout so an unreachable endpoint fails startup
/// instead of hanging it.
pub async fn open_store(
    config: &PasteConfig,
    settings: &RuntimeSettings,
    shutdown: &CancellationToken,
) -> Result<PasteStore> {
    let token = shutdown.child_token();
    let deadline = settings.service.request_timeout;

    let init = async {
        match config.infra.storage.backend {
            StorageBackend::Memory => {
                warn!("using in-memory storage; pastes will not survive a restart");
                PasteStore::initialize(Arc::new(MemoryBackend::new()), &token).await
            }
            StorageBackend::S3 => PasteStore::connect_s3(&settings.s3, &token).await,
        }
    };

    match tokio::time::timeout(deadline, init).await {
        Ok(store) => store.context("Failed to initialize storage"),
        Err(_) => {
            token.cancel();
            bail!("storage initialization timed out after {deadline:?}")
        }
    }
}

/// Run until `shutdown` is cancelled or the listener fails.
pub async fn run(config: PasteConfig, shutdown: CancellationToken) -> Result<()> {
    let settings = RuntimeSettings::from_config(&config);

    let store = open_store(&config, &settings, &shutdown).await?;
    info!(backend = %config.infra.storage.backend, "storage ready");

    let sweeper = Sweeper::new(store.clone(), settings.sweeper.clone());
    let sweep_state = sweeper.subscribe();
    let sweeper_handle = sweeper.spawn(shutdown.clone());

    let service = PasteService::new(store, settings.service.clone(), shutdown.clone());
    let app = web::router(AppState::new(service).with_sweeper(sweep_state));

    let addr = config.infra.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("listening on http://{}", addr);

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;

    // A listener error also has to stop the sweeper.
    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "sweeper task ended abnormally");
    }

    served.context("HTTP server failed")?;
    info!("shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
