// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{SessionId, Wish};

use super::snapshot::{SnapshotWriter, WishPersistence, WishSnapshot};

/// Process-wide home of every session's wishes.
///
/// Each call takes the lock once and finishes its mutation before releasing it, so concurrent
/// readers only ever observe whole tool invocations. When persistence is configured, every
/// mutation schedules a snapshot on the background writer; disk failures are logged there and
/// never reach the caller.
pub struct WishStore {
    partitions: Mutex<WishSnapshot>,
    writer: Option<SnapshotWriter>,
}

impl Default for WishStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl WishStore {
    pub fn in_memory() -> Self {
        Self {
            partitions: Mutex::new(WishSnapshot::new()),
            writer: None,
        }
    }

    /// Loads whatever `persistence` holds and keeps saving to it.
    ///
    /// A failed load starts from an empty store; a writer that cannot be started leaves the store
    /// in memory only. Both are logged.
    pub fn with_persistence(persistence: Arc<dyn WishPersistence>) -> Self {
        let partitions = match persistence.load() {
            Ok(snapshot) => {
                tracing::info!(sessions = snapshot.len(), "loaded wishes from disk");
                snapshot
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load wishes from disk");
                WishSnapshot::new()
            }
        };

        let writer = match SnapshotWriter::spawn(persistence) {
            Ok(writer) => Some(writer),
            Err(err) => {
                tracing::error!(error = %err, "wishes will not be persisted");
                None
            }
        };

        Self {
            partitions: Mutex::new(partitions),
            writer,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.writer.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, WishSnapshot> {
        self.partitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, partitions: &WishSnapshot) {
        if let Some(writer) = &self.writer {
            writer.schedule(partitions.clone());
        }
    }

    /// Appends to the session's sequence, creating it on first use.
    pub fn append(&self, session_id: &SessionId, wish: Wish) {
        let mut partitions = self.lock();
        partitions.entry(session_id.clone()).or_default().push(wish);
        self.persist(&partitions);
    }

    /// The session's wishes in insertion order; empty for unknown sessions.
    pub fn list(&self, session_id: &SessionId) -> Vec<Wish> {
        self.lock().get(session_id).cloned().unwrap_or_default()
    }

    pub fn count(&self, session_id: &SessionId) -> usize {
        self.lock().get(session_id).map_or(0, Vec::len)
    }

    /// First wish (in stored order) matching `predicate`.
    pub fn find_first_match(
        &self,
        session_id: &SessionId,
        predicate: impl Fn(&Wish) -> bool,
    ) -> Option<Wish> {
        self.lock().get(session_id)?.iter().find(|wish| predicate(wish)).cloned()
    }

    /// Applies `update` in place to the first wish matching `predicate` and returns the updated
    /// wish.
    pub fn update_first_match(
        &self,
        session_id: &SessionId,
        predicate: impl Fn(&Wish) -> bool,
        update: impl FnOnce(&mut Wish),
    ) -> Option<Wish> {
        let mut partitions = self.lock();
        let wish = partitions.get_mut(session_id)?.iter_mut().find(|wish| predicate(wish))?;
        update(wish);
        let updated = wish.clone();
        self.persist(&partitions);
        Some(updated)
    }

    /// Removes the first wish matching `predicate`; the rest keep their ids and order.
    pub fn remove(
        &self,
        session_id: &SessionId,
        predicate: impl Fn(&Wish) -> bool,
    ) -> Option<Wish> {
        let mut partitions = self.lock();
        let wishes = partitions.get_mut(session_id)?;
        let index = wishes.iter().position(|wish| predicate(wish))?;
        let removed = wishes.remove(index);
        self.persist(&partitions);
        Some(removed)
    }

    /// Discards the whole partition. Returns whether there was one.
    pub fn drop_session(&self, session_id: &SessionId) -> bool {
        let mut partitions = self.lock();
        let removed = partitions.remove(session_id).is_some();
        if removed {
            self.persist(&partitions);
        }
        removed
    }

    pub fn snapshot(&self) -> WishSnapshot {
        self.lock().clone()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Waits for pending snapshot writes. No-op for in-memory stores.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush();
        }
    }
}
