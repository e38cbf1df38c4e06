//! Server lifecycle management
//!
//! Runs the HTTP server and shuts it down on SIGTERM or Ctrl+C.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use saerinmeet_core::{bootstrap::Services, Config};

pub struct SaerinMeetServer {
    config: Config,
    services: Services,
}

impl SaerinMeetServer {
    pub const fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    /// Start the HTTP server and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut http_handle = self.start_http_server(shutdown_rx)?;
        info!("All servers started successfully");

        tokio::select! {
            result = &mut http_handle => {
                if let Err(e) = result {
                    error!("HTTP server task failed: {}", e);
                }
                return Err(anyhow::anyhow!("HTTP server stopped unexpectedly"));
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        // Let in-flight requests finish
        let _ = shutdown_tx.send(true);
        if let Err(e) = http_handle.await {
            error!("HTTP server task failed: {}", e);
        }
        self.shutdown();

        Ok(())
    }

    fn shutdown(&self) {
        let pending = self.services.recording_service.poller().scheduled_count();
        if pending > 0 {
            // Picked up again by resume_pending_polls on next start
            info!("{} completion poll(s) left for the next start", pending);
        }
        info!("SaerinMeet server shut down");
    }

    /// Start HTTP server with graceful shutdown support
    fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let http_router = saerinmeet_api::create_router(
            self.services.recording_service.clone(),
            self.services.jwt_service.clone(),
            self.services.webhook_verifier.clone(),
            &self.config.server.frontend_url,
        );

        let handle = tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(http_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind HTTP address {}: {}", http_addr, e);
                    return;
                }
            };

            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, http_router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
