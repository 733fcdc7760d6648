// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rmcp::transport::StreamableHttpServerConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::mcp::{WidgetUrls, WishboxMcp};
use crate::model::SessionId;
use crate::session::SessionTable;
use crate::store::{WishFile, WishStore};

/// Shared application state handed to every HTTP handler.
#[derive(Clone)]
pub struct Wishbox {
    sessions: Arc<SessionTable>,
    store: Arc<WishStore>,
    handler: WishboxMcp,
    http: StreamableHttpServerConfig,
    max_age: Duration,
}

impl Wishbox {
    pub fn new(store: Arc<WishStore>, widgets: WidgetUrls, max_age: Duration) -> Self {
        Self {
            sessions: Arc::new(SessionTable::new(Arc::clone(&store))),
            handler: WishboxMcp::new(Arc::clone(&store), widgets),
            store,
            http: StreamableHttpServerConfig {
                stateful_mode: true,
                ..StreamableHttpServerConfig::default()
            },
            max_age,
        }
    }

    /// Builds the store (file-backed when a wishes file is configured) and the session table.
    pub fn from_config(config: &Config) -> Self {
        let store = match config.wishes_file() {
            Some(path) => {
                let file = WishFile::new(path).with_durability(config.write_durability());
                WishStore::with_persistence(Arc::new(file))
            }
            None => WishStore::in_memory(),
        };
        Self::new(Arc::new(store), config.widget_urls(), config.session_max_age())
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// The session table as rmcp's session manager.
    pub fn session_manager(&self) -> Arc<SessionTable> {
        Arc::clone(&self.sessions)
    }

    pub fn handler(&self) -> &WishboxMcp {
        &self.handler
    }

    /// Streamable-HTTP settings; cancelling its token ends every open event stream.
    pub fn http_config(&self) -> &StreamableHttpServerConfig {
        &self.http
    }

    pub fn store(&self) -> &WishStore {
        &self.store
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn router(&self) -> Router {
        crate::http::router(self.clone())
    }

    /// Deletes the session and, with it, its wishes.
    pub async fn close_session(&self, id: &SessionId) -> bool {
        self.sessions
            .delete(id, |id| {
                self.store.drop_session(id);
            })
            .await
    }

    /// Removes expired sessions together with their wishes.
    pub async fn sweep(&self) -> usize {
        self.sessions
            .sweep(self.max_age, |id| {
                self.store.drop_session(id);
            })
            .await
    }

    /// Sweeps once per max age until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            let period = app.max_age;
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        app.sweep().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("session sweeper stopped");
        })
    }

    /// Final cleanup: one last sweep, close the remaining sessions, flush pending writes.
    ///
    /// Wishes of sessions that have not expired stay in the store (and on disk).
    pub async fn shutdown(&self) {
        let swept = self.sweep().await;
        let closed = self.sessions.close_all().await;
        self.store.flush();
        tracing::info!(swept, closed, "sessions cleaned up");
    }
}
