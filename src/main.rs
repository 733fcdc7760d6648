// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Wishbox server entrypoint.
//!
//! Serves MCP at `http://<host>:<port>/mcp` and a liveness probe at `/health`. Configuration
//! comes from flags or the matching environment variables (`wishbox --help`).

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;

use wishbox::app::Wishbox;
use wishbox::config::Config;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        if let Err(err) = wishbox::config::load_env_file(Path::new(".env")) {
            eprintln!("wishbox: failed to load .env: {err}");
        }
        let config = Config::parse();
        config.validate()?;
        wishbox::logging::init(config.environment(), config.log_level())?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        runtime.block_on(async move {
            let app = Wishbox::from_config(&config);
            let listener =
                tokio::net::TcpListener::bind((config.host(), config.port())).await?;
            let address = listener.local_addr()?;
            tracing::info!(
                address = %address,
                environment = ?config.environment(),
                widgets = config.widget_urls().base_url(),
                session_max_age_ms = app.max_age().as_millis() as u64,
                persistent = app.store().is_persistent(),
                "wishbox listening"
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let sweeper = app.spawn_sweeper(shutdown_rx);

            let router = app.router();
            let shutdown_token = app.http_config().cancellation_token.clone();
            let server_shutdown = shutdown_token.clone();
            let mut server = tokio::spawn(async move {
                let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                    server_shutdown.cancelled().await;
                });
                if let Err(err) = serve.await {
                    tracing::error!(error = %err, "HTTP server error");
                }
            });

            tokio::select! {
                _ = &mut server => {
                    tracing::warn!("HTTP server stopped unexpectedly");
                }
                _ = shutdown_signal() => {
                    tracing::info!("shutdown signal received");
                }
            }

            let _ = shutdown_tx.send(true);
            let _ = sweeper.await;
            app.shutdown().await;
            shutdown_token.cancel();

            if !server.is_finished() {
                if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
                    tracing::error!(
                        grace_secs = SHUTDOWN_GRACE.as_secs(),
                        "graceful shutdown timed out, forcing exit"
                    );
                    app.store().flush();
                    std::process::exit(1);
                }
            }

            app.store().flush();
            tracing::info!("wishbox stopped");
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("wishbox: {err}");
        std::process::exit(1);
    }
}
