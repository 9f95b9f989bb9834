//! In-memory entity store with dirty tracking and the remote-apply guard.
//!
//! Every mutating entry point applies the change to the in-memory collection
//! and, unless the caller is the remote-merge path, records the id in the
//! dirty set. The remote-merge path runs under [`Store::apply_remote`], which
//! flips an explicit apply-state enum for the duration of a synchronous
//! closure; nothing inside may suspend, so a single flag is safe without a
//! lock.

mod dirty;

pub use dirty::DirtySet;

use std::collections::HashMap;

use crate::errors::Result;
use crate::goals::{self, Goal};
use crate::ledger::{
    self, Account, ForecastLine, Movement,
};
use crate::sync::{remote_wins, EntityKind, RemoteRow};
use crate::tasks::{self, tree, Task};
use crate::utils::now_rfc3339;

/// Whether mutations originate locally or from a remote merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyState {
    #[default]
    Idle,
    ApplyingRemote,
}

/// What a push pass should do for one dirty id.
#[derive(Debug, Clone, PartialEq)]
pub enum PushPlan {
    Upsert {
        payload: serde_json::Value,
        client_timestamp: String,
    },
    Tombstone {
        client_timestamp: String,
    },
}

/// In-memory collections of decoded entities, keyed by id per kind.
#[derive(Debug, Default)]
pub struct Store {
    tasks: HashMap<String, Task>,
    goals: HashMap<String, Goal>,
    accounts: HashMap<String, Account>,
    forecast_lines: HashMap<String, ForecastLine>,
    movements: HashMap<String, Movement>,
    dirty: DirtySet,
    apply_state: ApplyState,
}

impl Store {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> &HashMap<String, Task> {
        &self.tasks
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.get(id)
    }

    pub fn goals(&self) -> &HashMap<String, Goal> {
        &self.goals
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> &HashMap<String, Account> {
        &self.accounts
    }

    pub fn forecast_line(&self, id: &str) -> Option<&ForecastLine> {
        self.forecast_lines.get(id)
    }

    pub fn forecast_lines(&self) -> &HashMap<String, ForecastLine> {
        &self.forecast_lines
    }

    pub fn movement(&self, id: &str) -> Option<&Movement> {
        self.movements.get(id)
    }

    pub fn movements(&self) -> &HashMap<String, Movement> {
        &self.movements
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: DirtySet) {
        self.dirty = dirty;
    }

    fn mark_dirty(&mut self, kind: EntityKind, id: &str) {
        if self.apply_state == ApplyState::Idle {
            self.dirty.insert(kind, id);
        }
    }

    /// True while a remote merge batch is being applied.
    pub fn is_applying_remote(&self) -> bool {
        self.apply_state == ApplyState::ApplyingRemote
    }

    /// Run `f` with the store in remote-apply mode: mutations made inside do
    /// not mark ids dirty. The state is restored on every exit path; `f` is
    /// synchronous, so no suspension can observe the flag.
    pub fn apply_remote<R>(&mut self, f: impl FnOnce(&mut Store) -> R) -> R {
        self.apply_state = ApplyState::ApplyingRemote;
        let result = f(self);
        self.apply_state = ApplyState::Idle;
        result
    }

    // --- local mutation entry points -------------------------------------

    pub fn upsert_task(&mut self, mut task: Task) {
        if self.apply_state == ApplyState::Idle {
            task.updated_at = Some(now_rfc3339());
        }
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        tree::recompute_levels(&mut self.tasks);
        self.mark_dirty(EntityKind::Task, &id);
    }

    pub fn delete_task(&mut self, id: &str) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.deleted = true;
            task.updated_at = Some(now_rfc3339());
        }
        self.mark_dirty(EntityKind::Task, id);
    }

    pub fn upsert_goal(&mut self, mut goal: Goal) {
        if self.apply_state == ApplyState::Idle {
            goal.updated_at = Some(now_rfc3339());
        }
        let id = goal.id.clone();
        self.goals.insert(id.clone(), goal);
        self.mark_dirty(EntityKind::Goal, &id);
    }

    pub fn delete_goal(&mut self, id: &str) {
        if let Some(goal) = self.goals.get_mut(id) {
            goal.deleted = true;
            goal.updated_at = Some(now_rfc3339());
        }
        self.mark_dirty(EntityKind::Goal, id);
    }

    pub fn upsert_account(&mut self, mut account: Account) {
        if self.apply_state == ApplyState::Idle {
            account.updated_at = Some(now_rfc3339());
        }
        let id = account.id.clone();
        self.accounts.insert(id.clone(), account);
        self.mark_dirty(EntityKind::Account, &id);
    }

    pub fn delete_account(&mut self, id: &str) {
        if let Some(account) = self.accounts.get_mut(id) {
            account.deleted = true;
            account.updated_at = Some(now_rfc3339());
        }
        self.mark_dirty(EntityKind::Account, id);
    }

    pub fn upsert_forecast_line(&mut self, mut line: ForecastLine) {
        if self.apply_state == ApplyState::Idle {
            line.updated_at = Some(now_rfc3339());
        }
        let id = line.id.clone();
        self.forecast_lines.insert(id.clone(), line);
        self.mark_dirty(EntityKind::ForecastLine, &id);
    }

    pub fn delete_forecast_line(&mut self, id: &str) {
        if let Some(line) = self.forecast_lines.get_mut(id) {
            line.deleted = true;
            line.updated_at = Some(now_rfc3339());
        }
        self.mark_dirty(EntityKind::ForecastLine, id);
    }

    pub fn upsert_movement(&mut self, mut movement: Movement) {
        if self.apply_state == ApplyState::Idle {
            movement.updated_at = Some(now_rfc3339());
        }
        let id = movement.id.clone();
        self.movements.insert(id.clone(), movement);
        self.mark_dirty(EntityKind::Movement, &id);
    }

    pub fn delete_movement(&mut self, id: &str) {
        if let Some(movement) = self.movements.get_mut(id) {
            movement.deleted = true;
            movement.updated_at = Some(now_rfc3339());
        }
        self.mark_dirty(EntityKind::Movement, id);
    }

    /// Reassign integer sort keys to the children of `parent`, marking the
    /// touched tasks dirty like any other local edit.
    pub fn renumber_task_siblings(&mut self, parent: Option<&str>) {
        let changed = tree::renumber_siblings(&mut self.tasks, parent);
        let now = now_rfc3339();
        for id in changed {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.updated_at = Some(now.clone());
            }
            self.mark_dirty(EntityKind::Task, &id);
        }
    }

    /// Recompute the derived depth index of the task tree.
    pub fn recompute_task_levels(&mut self) {
        tree::recompute_levels(&mut self.tasks);
    }

    // --- remote merge ----------------------------------------------------

    /// Merge one pulled row into the store. Must run inside
    /// [`Store::apply_remote`]. Tombstones remove the id unconditionally;
    /// otherwise last-write-wins on the client timestamp decides. Returns
    /// whether the row changed local state.
    pub fn apply_remote_row(&mut self, kind: EntityKind, row: &RemoteRow) -> Result<bool> {
        debug_assert!(self.is_applying_remote());

        if row.is_tombstone() {
            let existed = match kind {
                EntityKind::Task => self.tasks.remove(&row.id).is_some(),
                EntityKind::Goal => self.goals.remove(&row.id).is_some(),
                EntityKind::Account => self.accounts.remove(&row.id).is_some(),
                EntityKind::ForecastLine => self.forecast_lines.remove(&row.id).is_some(),
                EntityKind::Movement => self.movements.remove(&row.id).is_some(),
            };
            // A remote delete also settles any local edit still in flight.
            self.dirty.remove(kind, &row.id);
            return Ok(existed);
        }

        let timestamp = Some(row.client_timestamp.clone());
        let applied = match kind {
            EntityKind::Task => {
                let local = self.tasks.get(&row.id).and_then(|t| t.updated_at.as_deref());
                if remote_wins(local, &row.client_timestamp) {
                    let mut task = tasks::decode_task(&row.payload)?;
                    task.id = row.id.clone();
                    task.updated_at = timestamp;
                    self.tasks.insert(row.id.clone(), task);
                    true
                } else {
                    false
                }
            }
            EntityKind::Goal => {
                let local = self.goals.get(&row.id).and_then(|g| g.updated_at.as_deref());
                if remote_wins(local, &row.client_timestamp) {
                    let mut goal = goals::decode_goal(&row.payload)?;
                    goal.id = row.id.clone();
                    goal.updated_at = timestamp;
                    self.goals.insert(row.id.clone(), goal);
                    true
                } else {
                    false
                }
            }
            EntityKind::Account => {
                let local = self
                    .accounts
                    .get(&row.id)
                    .and_then(|a| a.updated_at.as_deref());
                if remote_wins(local, &row.client_timestamp) {
                    let mut account = ledger::decode_account(&row.payload)?;
                    account.id = row.id.clone();
                    account.updated_at = timestamp;
                    self.accounts.insert(row.id.clone(), account);
                    true
                } else {
                    false
                }
            }
            EntityKind::ForecastLine => {
                let local = self
                    .forecast_lines
                    .get(&row.id)
                    .and_then(|l| l.updated_at.as_deref());
                if remote_wins(local, &row.client_timestamp) {
                    let mut line = ledger::decode_forecast_line(&row.payload)?;
                    line.id = row.id.clone();
                    line.updated_at = timestamp;
                    self.forecast_lines.insert(row.id.clone(), line);
                    true
                } else {
                    false
                }
            }
            EntityKind::Movement => {
                let local = self
                    .movements
                    .get(&row.id)
                    .and_then(|m| m.updated_at.as_deref());
                if remote_wins(local, &row.client_timestamp) {
                    let mut movement = ledger::decode_movement(&row.payload)?;
                    movement.id = row.id.clone();
                    movement.updated_at = timestamp;
                    self.movements.insert(row.id.clone(), movement);
                    true
                } else {
                    false
                }
            }
        };
        Ok(applied)
    }

    // --- push support ----------------------------------------------------

    /// Decide what to push for one dirty id: an upsert of the canonicalized
    /// value, or a tombstone when the entity is locally deleted (flagged or
    /// already absent). Canonicalize refreshes the update timestamp; the
    /// refreshed value is written back so the local copy and the pushed
    /// payload agree.
    pub fn plan_push(&mut self, kind: EntityKind, id: &str) -> Result<PushPlan> {
        let plan = match kind {
            EntityKind::Task => match self.tasks.get_mut(id) {
                Some(task) if !task.deleted => {
                    let wire = tasks::canonicalize(task);
                    let ts = wire.updated_at.clone().unwrap_or_else(now_rfc3339);
                    task.updated_at = Some(ts.clone());
                    PushPlan::Upsert {
                        payload: serde_json::to_value(wire)?,
                        client_timestamp: ts,
                    }
                }
                Some(task) => PushPlan::Tombstone {
                    client_timestamp: task.updated_at.clone().unwrap_or_else(now_rfc3339),
                },
                None => PushPlan::Tombstone {
                    client_timestamp: now_rfc3339(),
                },
            },
            EntityKind::Goal => match self.goals.get_mut(id) {
                Some(goal) if !goal.deleted => {
                    let wire = goals::canonicalize_goal(goal);
                    let ts = wire.updated_at.clone().unwrap_or_else(now_rfc3339);
                    goal.updated_at = Some(ts.clone());
                    PushPlan::Upsert {
                        payload: serde_json::to_value(wire)?,
                        client_timestamp: ts,
                    }
                }
                Some(goal) => PushPlan::Tombstone {
                    client_timestamp: goal.updated_at.clone().unwrap_or_else(now_rfc3339),
                },
                None => PushPlan::Tombstone {
                    client_timestamp: now_rfc3339(),
                },
            },
            EntityKind::Account => match self.accounts.get_mut(id) {
                Some(account) if !account.deleted => {
                    let wire = ledger::canonicalize_account(account);
                    let ts = wire.updated_at.clone().unwrap_or_else(now_rfc3339);
                    account.updated_at = Some(ts.clone());
                    PushPlan::Upsert {
                        payload: serde_json::to_value(wire)?,
                        client_timestamp: ts,
                    }
                }
                Some(account) => PushPlan::Tombstone {
                    client_timestamp: account.updated_at.clone().unwrap_or_else(now_rfc3339),
                },
                None => PushPlan::Tombstone {
                    client_timestamp: now_rfc3339(),
                },
            },
            EntityKind::ForecastLine => match self.forecast_lines.get_mut(id) {
                Some(line) if !line.deleted => {
                    let wire = ledger::canonicalize_forecast_line(line);
                    let ts = wire.updated_at.clone().unwrap_or_else(now_rfc3339);
                    line.updated_at = Some(ts.clone());
                    PushPlan::Upsert {
                        payload: serde_json::to_value(wire)?,
                        client_timestamp: ts,
                    }
                }
                Some(line) => PushPlan::Tombstone {
                    client_timestamp: line.updated_at.clone().unwrap_or_else(now_rfc3339),
                },
                None => PushPlan::Tombstone {
                    client_timestamp: now_rfc3339(),
                },
            },
            EntityKind::Movement => match self.movements.get_mut(id) {
                Some(movement) if !movement.deleted => {
                    let wire = ledger::canonicalize_movement(movement);
                    let ts = wire.updated_at.clone().unwrap_or_else(now_rfc3339);
                    movement.updated_at = Some(ts.clone());
                    PushPlan::Upsert {
                        payload: serde_json::to_value(wire)?,
                        client_timestamp: ts,
                    }
                }
                Some(movement) => PushPlan::Tombstone {
                    client_timestamp: movement.updated_at.clone().unwrap_or_else(now_rfc3339),
                },
                None => PushPlan::Tombstone {
                    client_timestamp: now_rfc3339(),
                },
            },
        };
        Ok(plan)
    }

    /// Settle one id after its push succeeded: clear it from the dirty set
    /// and drop the row if it was a flagged tombstone.
    pub fn complete_push(&mut self, kind: EntityKind, id: &str) {
        let flagged_deleted = match kind {
            EntityKind::Task => self.tasks.get(id).map(|t| t.deleted),
            EntityKind::Goal => self.goals.get(id).map(|g| g.deleted),
            EntityKind::Account => self.accounts.get(id).map(|a| a.deleted),
            EntityKind::ForecastLine => self.forecast_lines.get(id).map(|l| l.deleted),
            EntityKind::Movement => self.movements.get(id).map(|m| m.deleted),
        };
        if flagged_deleted == Some(true) {
            match kind {
                EntityKind::Task => {
                    self.tasks.remove(id);
                }
                EntityKind::Goal => {
                    self.goals.remove(id);
                }
                EntityKind::Account => {
                    self.accounts.remove(id);
                }
                EntityKind::ForecastLine => {
                    self.forecast_lines.remove(id);
                }
                EntityKind::Movement => {
                    self.movements.remove(id);
                }
            }
        }
        self.dirty.remove(kind, id);
    }

    // --- startup restore -------------------------------------------------

    pub(crate) fn restore_task(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub(crate) fn restore_goal(&mut self, goal: Goal) {
        self.goals.insert(goal.id.clone(), goal);
    }

    pub(crate) fn restore_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub(crate) fn restore_forecast_line(&mut self, line: ForecastLine) {
        self.forecast_lines.insert(line.id.clone(), line);
    }

    pub(crate) fn restore_movement(&mut self, movement: Movement) {
        self.movements.insert(movement.id.clone(), movement);
    }
}
