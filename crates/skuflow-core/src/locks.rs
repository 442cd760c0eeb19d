// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-IMEI write exclusion shared by the queue processor and the archival manager.
//!
//! Inventory upserts and per-IMEI archival take the IMEI's mutex (and the
//! read side of a global barrier). Whole-table archival takes the barrier's
//! write side, which waits for every in-flight IMEI writer.
//!
//! Multi-key acquisition always locks keys in sorted order, so two batches
//! touching overlapping IMEIs cannot deadlock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Registry of per-IMEI async mutexes.
#[derive(Debug, Default)]
pub struct ImeiLocks {
    barrier: Arc<RwLock<()>>,
    keys: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds one or more IMEI locks until dropped.
#[must_use = "the IMEI lock is released when the guard is dropped"]
pub struct ImeiGuard {
    // Field order matters: key guards drop before the barrier guard.
    _keys: Vec<OwnedMutexGuard<()>>,
    _barrier: OwnedRwLockReadGuard<()>,
}

/// Excludes every IMEI writer until dropped.
#[must_use = "the global lock is released when the guard is dropped"]
pub struct ExclusiveGuard {
    _barrier: OwnedRwLockWriteGuard<()>,
}

impl ImeiLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a single IMEI.
    pub async fn lock(&self, imei: &str) -> ImeiGuard {
        self.lock_many([imei]).await
    }

    /// Lock several IMEIs at once. Duplicates are ignored.
    pub async fn lock_many<I, S>(&self, imeis: I) -> ImeiGuard
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = imeis.into_iter().map(|s| s.as_ref().to_string()).collect();
        keys.sort();
        keys.dedup();

        let barrier = self.barrier.clone().read_owned().await;
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self
                .keys
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(mutex.lock_owned().await);
        }

        ImeiGuard {
            _keys: guards,
            _barrier: barrier,
        }
    }

    /// Exclude all IMEI writers.
    pub async fn lock_all(&self) -> ExclusiveGuard {
        ExclusiveGuard {
            _barrier: self.barrier.clone().write_owned().await,
        }
    }

    /// Drop registry entries nobody is holding or waiting on.
    pub fn prune(&self) {
        self.keys.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of IMEIs currently tracked.
    pub fn tracked(&self) -> usize {
        self.keys.len()
    }
}
