//! notecast notes API
//!
//! Stores notes and announces them, along with ad-hoc notifications, to
//! realtime subscribers through a Pusher-compatible broadcast server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notecast_broadcast::{HttpBroadcaster, Publisher};
use notecast_notes_api::{api, config, notes::NoteRepository, state::AppState};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to NOTECAST_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting notecast notes API");
    info!(
        listen_addr = %config.listen_addr,
        events_url = %config.broadcast.events_url(),
        "Configuration loaded"
    );

    let broadcaster = HttpBroadcaster::new(&config.broadcast)?;
    let publisher = Publisher::new(Arc::new(broadcaster));
    let state = AppState::new(NoteRepository::new(), publisher);

    let app = api::create_router(state);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // Either a `true` or a dropped sender ends the wait.
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                info!("HTTP server shutting down");
            })
            .await
    });

    let server_exited = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
            true
        }
    };

    if !server_exited {
        let _ = shutdown_tx.send(true);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_handle).await.is_err() {
            warn!("HTTP server did not drain in time");
        }
    }

    info!("Notes API shutdown complete");
    Ok(())
}
