// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::{SessionId, Wish};

/// Every session's wishes, keyed by session id. This is also the on-disk layout.
pub type WishSnapshot = BTreeMap<SessionId, Vec<Wish>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid wishes file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("refusing to write through symlink at {}", path.display())]
    SymlinkRefused { path: PathBuf },
    #[error("failed to start snapshot writer: {0}")]
    Worker(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDurability {
    #[default]
    BestEffort,
    /// fsync the snapshot file and its directory after each write.
    Durable,
}

/// Save/load contract for the wish store. The store works the same with or without one.
pub trait WishPersistence: Send + Sync {
    fn load(&self) -> Result<WishSnapshot, StoreError>;
    fn save(&self, snapshot: &WishSnapshot) -> Result<(), StoreError>;
}

/// A single pretty-printed JSON object mapping session ids to wish arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishFile {
    path: PathBuf,
    durability: WriteDurability,
}

impl WishFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            durability: WriteDurability::default(),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WishPersistence for WishFile {
    fn load(&self) -> Result<WishSnapshot, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(WishSnapshot::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, snapshot: &WishSnapshot) -> Result<(), StoreError> {
        let mut contents = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        contents.push(b'\n');
        write_atomic(&self.path, &contents, self.durability)
    }
}

fn write_atomic(
    path: &Path,
    contents: &[u8],
    durability: WriteDurability,
) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    match fs::symlink_metadata(path) {
        Ok(md) if md.file_type().is_symlink() => {
            return Err(StoreError::SymlinkRefused {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    let Some(file_name) = path.file_name() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        });
    };

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let tmp_path = parent.join(format!(".wishbox.tmp.{}.{nanos}", file_name.to_string_lossy()));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;

    file.write_all(contents).map_err(|source| StoreError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    if durability == WriteDurability::Durable {
        file.sync_all().map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
    }
    drop(file);

    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            let dir = fs::File::open(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            dir.sync_all().map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

#[derive(Default)]
struct WriterState {
    pending: Option<WishSnapshot>,
    in_flight: bool,
    shutdown: bool,
}

struct WriterInner {
    state: Mutex<WriterState>,
    cv: Condvar,
    persistence: Arc<dyn WishPersistence>,
}

/// Writes snapshots on a dedicated thread so tool calls never wait on disk.
///
/// Only the newest pending snapshot is written; older ones are superseded before they hit disk.
pub(crate) struct SnapshotWriter {
    inner: Arc<WriterInner>,
    worker: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    pub(crate) fn spawn(persistence: Arc<dyn WishPersistence>) -> Result<Self, StoreError> {
        let inner = Arc::new(WriterInner {
            state: Mutex::new(WriterState::default()),
            cv: Condvar::new(),
            persistence,
        });

        let worker = std::thread::Builder::new()
            .name("wishbox-snapshot".to_owned())
            .spawn({
                let inner = inner.clone();
                move || Self::run_worker(inner)
            })
            .map_err(StoreError::Worker)?;

        Ok(Self {
            inner,
            worker: Some(worker),
        })
    }

    pub(crate) fn schedule(&self, snapshot: WishSnapshot) {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending = Some(snapshot);
        self.inner.cv.notify_all();
    }

    /// Blocks until every scheduled snapshot has been written (or failed).
    pub(crate) fn flush(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.pending.is_some() || state.in_flight {
            state = self.inner.cv.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn run_worker(inner: Arc<WriterInner>) {
        loop {
            let snapshot = {
                let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if let Some(snapshot) = state.pending.take() {
                        state.in_flight = true;
                        break snapshot;
                    }
                    if state.shutdown {
                        return;
                    }
                    state = inner.cv.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
            };

            if let Err(err) = inner.persistence.save(&snapshot) {
                tracing::error!(error = %err, "failed to save wishes snapshot");
            } else {
                tracing::trace!(sessions = snapshot.len(), "saved wishes snapshot");
            }

            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = false;
            inner.cv.notify_all();
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.shutdown = true;
            self.inner.cv.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
