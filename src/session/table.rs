// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rmcp::transport::streamable_http_server::session::local::{
    create_local_session, LocalSessionManager, SessionTransport,
};
use rmcp::transport::WorkerTransport;
use tokio::time::Instant;

use crate::model::SessionId;
use crate::store::WishStore;

/// One live protocol conversation.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: Instant,
    created_at_utc: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the session was created before `cutoff`.
    fn expired(&self, cutoff: Instant) -> bool {
        self.created_at < cutoff
    }
}

/// Session id → session, with creation-time based expiry.
///
/// Age is measured from creation only; using a session does not extend it. Times come from
/// the tokio clock so a paused test runtime controls expiry. Every registered session has a
/// matching rmcp handle in `local`, which carries its protocol traffic.
pub struct SessionTable {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    pub(super) local: LocalSessionManager,
    pub(super) store: Arc<WishStore>,
}

impl SessionTable {
    pub fn new(store: Arc<WishStore>) -> Self {
        Self {
            sessions: Mutex::default(),
            local: LocalSessionManager::default(),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new session with a fresh id. The returned transport must be served by a
    /// handler for the session to answer anything.
    pub async fn create(&self) -> (Arc<Session>, SessionTransport) {
        self.create_at(Instant::now()).await
    }

    pub(crate) async fn create_at(&self, created_at: Instant) -> (Arc<Session>, SessionTransport) {
        let (session, live) = {
            let mut sessions = self.lock();
            let id = loop {
                let candidate = SessionId::generate();
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            };
            let session = Arc::new(Session {
                id: id.clone(),
                created_at,
                created_at_utc: Utc::now(),
            });
            sessions.insert(id, Arc::clone(&session));
            (session, sessions.len())
        };

        let (handle, worker) =
            create_local_session(session.id.as_str(), self.local.session_config.clone());
        self.local.sessions.write().await.insert(handle.id().clone(), handle);

        tracing::info!(
            session_id = %session.id,
            created_at = %session.created_at_utc,
            sessions = live,
            "session created"
        );
        (session, WorkerTransport::spawn(worker))
    }

    /// Pure lookup; does not refresh the session's age.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes the session and closes its protocol handle; `on_removed` runs with the id when
    /// there was one. Unknown ids are a no-op.
    pub async fn delete(&self, id: &SessionId, mut on_removed: impl FnMut(&SessionId)) -> bool {
        if self.lock().remove(id).is_none() {
            return false;
        }
        on_removed(id);
        self.release(id).await;
        tracing::info!(session_id = %id, "session deleted");
        true
    }

    /// Removes every session created more than `max_age` ago. Returns the number removed.
    pub async fn sweep(&self, max_age: Duration, on_removed: impl FnMut(&SessionId)) -> usize {
        self.sweep_at(Instant::now(), max_age, on_removed).await
    }

    pub(crate) async fn sweep_at(
        &self,
        now: Instant,
        max_age: Duration,
        mut on_removed: impl FnMut(&SessionId),
    ) -> usize {
        // An age larger than the process uptime cannot have expired anything yet.
        let Some(cutoff) = now.checked_sub(max_age) else {
            return 0;
        };

        let expired: Vec<SessionId> = {
            let mut sessions = self.lock();
            let ids: Vec<SessionId> = sessions
                .values()
                .filter(|session| session.expired(cutoff))
                .map(|session| session.id.clone())
                .collect();
            for id in &ids {
                sessions.remove(id);
            }
            ids
        };

        for id in &expired {
            on_removed(id);
            self.release(id).await;
        }
        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), "swept expired sessions");
        }
        expired.len()
    }

    /// Closes every session and empties the table without touching stored wishes.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<SessionId> = self.lock().drain().map(|(id, _)| id).collect();
        for id in &ids {
            self.release(id).await;
        }
        ids.len()
    }

    /// Stops the session's service while leaving it registered.
    #[cfg(test)]
    pub(crate) async fn stop_service(&self, id: &SessionId) {
        self.release(id).await;
    }

    /// Drops the rmcp handle, which stops the session's service.
    async fn release(&self, id: &SessionId) {
        let handle = self.local.sessions.write().await.remove(id.as_str());
        if let Some(handle) = handle {
            if let Err(err) = handle.close().await {
                tracing::debug!(session_id = %id, error = %err, "session service already stopped");
            }
        }
    }
}
