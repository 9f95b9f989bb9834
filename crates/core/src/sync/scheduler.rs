//! Background scheduling: debounced push after local mutations, periodic
//! pull, and pull on regained foreground.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::store::Store;

use super::{PullOutcome, RemoteGateway, SyncEngine, SyncStatus, SyncTrigger};

/// Delay between a local mutation and the push that flushes it; bursts of
/// edits inside the window coalesce into a single push pass.
pub const PUSH_DEBOUNCE_MS: u64 = 1_500;

/// Periodic pull cadence in seconds.
pub const PULL_INTERVAL_SECS: u64 = 45;

/// Maximum jitter (seconds) added to periodic pull intervals.
pub const PULL_INTERVAL_JITTER_SECS: u64 = 5;

fn interval_jitter_secs() -> u64 {
    if PULL_INTERVAL_JITTER_SECS == 0 {
        return 0;
    }
    Utc::now().timestamp_millis().unsigned_abs() % (PULL_INTERVAL_JITTER_SECS + 1)
}

/// Owns the engine behind a mutex plus the two background loops. Overlapping
/// periodic ticks are dropped when the engine is busy; the engine's own pull
/// gate covers direct callers.
pub struct SyncHandle<G> {
    engine: Arc<Mutex<SyncEngine<G>>>,
    push_notify: Arc<Notify>,
    push_task: JoinHandle<()>,
    pull_task: JoinHandle<()>,
}

impl<G: RemoteGateway + 'static> SyncHandle<G> {
    /// Spawn the debounced-push and periodic-pull loops around an engine.
    pub fn spawn(engine: SyncEngine<G>) -> Self {
        let engine = Arc::new(Mutex::new(engine));
        let push_notify = Arc::new(Notify::new());

        let push_task = {
            let engine = Arc::clone(&engine);
            let push_notify = Arc::clone(&push_notify);
            tokio::spawn(async move {
                loop {
                    push_notify.notified().await;
                    tokio::time::sleep(Duration::from_millis(PUSH_DEBOUNCE_MS)).await;
                    let mut engine = engine.lock().await;
                    if let Err(err) = engine.push().await {
                        warn!("[Sync] Debounced push failed: {err}");
                    }
                }
            })
        };

        let pull_task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                loop {
                    let delay = PULL_INTERVAL_SECS + interval_jitter_secs();
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    match engine.try_lock() {
                        Ok(mut engine) => {
                            if let Err(err) =
                                engine.sync_cycle(SyncTrigger::Periodic).await
                            {
                                warn!("[Sync] Periodic cycle failed: {err}");
                            }
                        }
                        Err(_) => {
                            debug!("[Sync] Periodic tick skipped, engine busy");
                        }
                    }
                }
            })
        };

        SyncHandle {
            engine,
            push_notify,
            push_task,
            pull_task,
        }
    }

    /// Apply a local mutation, persist it, and request a debounced push.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut Store) -> R) -> Result<R> {
        let result = {
            let mut engine = self.engine.lock().await;
            engine.with_store(f)?
        };
        self.push_notify.notify_one();
        Ok(result)
    }

    /// Pull immediately, e.g. on regained foreground or explicit refresh.
    pub async fn pull_now(&self, trigger: SyncTrigger) -> Result<PullOutcome> {
        debug!("[Sync] Pull requested trigger={trigger:?}");
        let mut engine = self.engine.lock().await;
        engine.pull().await
    }

    /// Flush the dirty set immediately, skipping the debounce window.
    pub async fn push_now(&self) -> Result<super::PushOutcome> {
        let mut engine = self.engine.lock().await;
        engine.push().await
    }

    /// Snapshot of the observable engine status.
    pub async fn status(&self) -> SyncStatus {
        self.engine.lock().await.status().clone()
    }

    /// Read from the engine under the lock.
    pub async fn with_engine<R>(&self, f: impl FnOnce(&SyncEngine<G>) -> R) -> R {
        let engine = self.engine.lock().await;
        f(&engine)
    }

    /// Stop both background loops.
    pub fn shutdown(&self) {
        self.push_task.abort();
        self.pull_task.abort();
    }
}
