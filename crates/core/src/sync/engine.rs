//! Sync engine: pull/push orchestration over the remote gateway.

use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::store::{PushPlan, Store};
use crate::utils::now_rfc3339;

use super::{
    snapshot_of, EntityKind, GatewayError, LocalStateStore, RemoteGateway, SyncTrigger,
    Watermarks,
};

/// Observable engine state for the surrounding UI. A failed pull or push is
/// never fatal; the engine stays usable and retries on its own schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_pull_at: Option<String>,
    pub last_push_at: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: i32,
}

/// Result of one pull pass.
#[derive(Debug, Default)]
pub struct PullOutcome {
    /// True when another pull was already in flight and this one backed off.
    pub skipped: bool,
    pub fetched: usize,
    pub applied: usize,
    /// Per-kind fetch failures; the other kinds were still merged.
    pub errors: Vec<(EntityKind, GatewayError)>,
}

/// Result of one push pass.
#[derive(Debug, Default)]
pub struct PushOutcome {
    pub attempted: usize,
    pub pushed: usize,
    /// Set when the pass stopped on a terminal authentication failure.
    pub auth_failure: Option<GatewayError>,
}

/// Result of one full cycle (push, then pull).
#[derive(Debug)]
pub struct SyncCycleOutcome {
    pub trigger: SyncTrigger,
    pub push: PushOutcome,
    pub pull: PullOutcome,
}

/// Orchestrates pull, push and local persistence over a remote gateway.
pub struct SyncEngine<G> {
    gateway: G,
    store: Store,
    state: LocalStateStore,
    watermarks: Watermarks,
    status: SyncStatus,
    pull_in_progress: bool,
}

impl<G: RemoteGateway> SyncEngine<G> {
    /// Build an engine from persisted state: watermarks, dirty set and the
    /// entity snapshot are reloaded, and task levels recomputed.
    pub fn new(gateway: G, state: LocalStateStore) -> Result<Self> {
        let watermarks = state.load_watermarks()?;
        let dirty = state.load_dirty()?;
        let snapshot = state.load_snapshot()?;

        let mut store = Store::default();
        super::restore_into(&mut store, &snapshot);
        store.set_dirty(dirty);

        Ok(SyncEngine {
            gateway,
            store,
            state,
            watermarks,
            status: SyncStatus::default(),
            pull_in_progress: false,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    /// Apply a local mutation and persist the dirty set and entity snapshot.
    /// This is the entry point UI-facing code funnels edits through.
    pub fn with_store<R>(&mut self, f: impl FnOnce(&mut Store) -> R) -> Result<R> {
        let result = f(&mut self.store);
        self.persist_local()?;
        Ok(result)
    }

    fn persist_local(&self) -> Result<()> {
        self.state.save_dirty(self.store.dirty())?;
        self.state.save_snapshot(&snapshot_of(&self.store))
    }

    /// Push then pull, the order the background cycle uses.
    pub async fn sync_cycle(&mut self, trigger: SyncTrigger) -> Result<SyncCycleOutcome> {
        debug!("[Sync] Cycle start trigger={trigger:?}");
        let push = self.push().await?;
        let pull = self.pull().await?;
        debug!(
            "[Sync] Cycle complete trigger={trigger:?} pushed={} pulled={}",
            push.pushed, pull.applied
        );
        Ok(SyncCycleOutcome {
            trigger,
            push,
            pull,
        })
    }

    /// Incremental pull: fetch rows newer than each kind's watermark, merge
    /// them last-write-wins, and advance the watermarks that saw rows.
    ///
    /// Re-entry is gated: a pull arriving while one is in flight returns a
    /// skipped outcome instead of overlapping it.
    pub async fn pull(&mut self) -> Result<PullOutcome> {
        if self.pull_in_progress {
            debug!("[Sync] Pull already in progress, skipping");
            return Ok(PullOutcome {
                skipped: true,
                ..PullOutcome::default()
            });
        }

        self.pull_in_progress = true;
        let result = self.pull_inner().await;
        self.pull_in_progress = false;

        match &result {
            Ok(outcome) => {
                self.status.last_pull_at = Some(now_rfc3339());
                if let Some((kind, err)) = outcome.errors.first() {
                    self.status.last_error = Some(format!("pull {kind}: {err}"));
                    self.status.consecutive_failures += 1;
                } else {
                    self.status.last_error = None;
                    self.status.consecutive_failures = 0;
                }
            }
            Err(err) => {
                self.status.last_error = Some(err.to_string());
                self.status.consecutive_failures += 1;
            }
        }
        result
    }

    async fn pull_inner(&mut self) -> Result<PullOutcome> {
        let gateway = &self.gateway;
        let fetches = EntityKind::ALL.map(|kind| {
            let since = self.watermarks.get(&kind).copied();
            async move { (kind, gateway.fetch_since(kind, since).await) }
        });
        let results = join_all(fetches).await;

        let mut outcome = PullOutcome::default();
        let mut tasks_touched = false;
        for (kind, result) in results {
            let mut rows = match result {
                Ok(rows) => rows,
                Err(err) => {
                    // Partial-failure isolation: this kind's watermark stays
                    // put and the other kinds still merge.
                    warn!("[Sync] Pull failed for {kind}: {err}");
                    outcome.errors.push((kind, err));
                    continue;
                }
            };
            if rows.is_empty() {
                // An all-empty fetch never advances the watermark.
                continue;
            }

            // Ascending revision order: duplicate ids in one batch resolve to
            // the later row.
            rows.sort_by_key(|row| row.revision);
            let max_revision = rows.last().map(|row| row.revision).unwrap_or(0);
            outcome.fetched += rows.len();

            let applied = self.store.apply_remote(|store| {
                let mut applied = 0usize;
                for row in &rows {
                    match store.apply_remote_row(kind, row) {
                        Ok(true) => applied += 1,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(
                                "[Sync] Skipping undecodable {kind} row {}: {err}",
                                row.id
                            );
                        }
                    }
                }
                applied
            });
            outcome.applied += applied;
            if kind == EntityKind::Task && applied > 0 {
                tasks_touched = true;
            }

            let entry = self.watermarks.entry(kind).or_insert(max_revision);
            *entry = (*entry).max(max_revision);
        }

        if tasks_touched {
            self.store.recompute_task_levels();
        }
        self.state.save_watermarks(&self.watermarks)?;
        self.persist_local()?;
        Ok(outcome)
    }

    /// Flush the dirty set: upsert live entities, tombstone deleted or absent
    /// ones. Each id is cleared only after its own push succeeded; failures
    /// leave it dirty for the next scheduled pass. An authentication failure
    /// stops the pass immediately.
    pub async fn push(&mut self) -> Result<PushOutcome> {
        let pending = self.store.dirty().entries();
        let mut outcome = PushOutcome {
            attempted: pending.len(),
            ..PushOutcome::default()
        };
        let mut failed = 0usize;

        for (kind, id) in pending {
            let plan = self.store.plan_push(kind, &id)?;
            let result = match &plan {
                PushPlan::Upsert {
                    payload,
                    client_timestamp,
                } => {
                    self.gateway
                        .upsert(kind, &id, payload.clone(), client_timestamp)
                        .await
                }
                PushPlan::Tombstone { client_timestamp } => {
                    self.gateway.tombstone(kind, &id, client_timestamp).await
                }
            };

            match result {
                Ok(()) => {
                    self.store.complete_push(kind, &id);
                    outcome.pushed += 1;
                }
                Err(err) if err.is_auth() => {
                    warn!("[Sync] Auth failure during push, stopping: {err}");
                    self.status.last_error = Some(err.to_string());
                    outcome.auth_failure = Some(err);
                    break;
                }
                Err(err) => {
                    warn!("[Sync] Push failed for {kind} {id}: {err}");
                    self.status.last_error = Some(err.to_string());
                    failed += 1;
                }
            }
        }

        if outcome.pushed > 0 {
            self.status.last_push_at = Some(now_rfc3339());
        }
        if failed == 0 && outcome.auth_failure.is_none() {
            self.status.last_error = None;
            self.status.consecutive_failures = 0;
        } else {
            self.status.consecutive_failures += 1;
        }
        self.persist_local()?;
        Ok(outcome)
    }
}
