//! Persisted local sync state.
//!
//! Three independent JSON files live in the state directory: the per-kind
//! pull watermarks, the dirty set, and the canonicalized entity snapshot.
//! Each file is replaced atomically (temp file + rename), so a crash between
//! any two saves costs at worst a redundant re-pull or re-push, never data.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::goals::{canonicalize_goal_at, hydrate_goal, WireGoal};
use crate::ledger::{
    canonicalize_account_at, canonicalize_forecast_line_at, canonicalize_movement_at,
    hydrate_account, hydrate_forecast_line, hydrate_movement, WireAccount,
    WireForecastLine, WireMovement,
};
use crate::store::{DirtySet, Store};
use crate::tasks::{canonicalize_at, hydrate, WireTask};
use crate::utils::parse_rfc3339;

use super::EntityKind;

const WATERMARKS_FILE: &str = "watermarks.json";
const DIRTY_FILE: &str = "dirty.json";
const ENTITIES_FILE: &str = "entities.json";

/// Per-kind pull watermarks, persisted as opaque strings.
pub type Watermarks = BTreeMap<EntityKind, i64>;

/// On-disk sparse representation of every locally held entity, in wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySnapshot {
    pub task: Vec<WireTask>,
    pub goal: Vec<WireGoal>,
    pub account: Vec<WireAccount>,
    pub forecast_line: Vec<WireForecastLine>,
    pub movement: Vec<WireMovement>,
}

/// Reads and writes the persisted sync state under one directory.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    dir: PathBuf,
}

impl LocalStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(LocalStateStore { dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)
    }

    pub fn load_watermarks(&self) -> Result<Watermarks> {
        let path = self.path(WATERMARKS_FILE);
        if !path.exists() {
            return Ok(Watermarks::new());
        }
        let raw: BTreeMap<EntityKind, String> = serde_json::from_slice(&fs::read(path)?)?;
        // Watermarks are opaque strings on disk; entries this build cannot
        // interpret are treated as absent (full pull for that kind).
        Ok(raw
            .into_iter()
            .filter_map(|(kind, value)| value.parse::<i64>().ok().map(|v| (kind, v)))
            .collect())
    }

    pub fn save_watermarks(&self, watermarks: &Watermarks) -> Result<()> {
        let raw: BTreeMap<EntityKind, String> = watermarks
            .iter()
            .map(|(kind, value)| (*kind, value.to_string()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&raw)?;
        Self::write_atomic(&self.path(WATERMARKS_FILE), &bytes)?;
        Ok(())
    }

    pub fn load_dirty(&self) -> Result<DirtySet> {
        let path = self.path(DIRTY_FILE);
        if !path.exists() {
            return Ok(DirtySet::default());
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn save_dirty(&self, dirty: &DirtySet) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(dirty)?;
        Self::write_atomic(&self.path(DIRTY_FILE), &bytes)?;
        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<EntitySnapshot> {
        let path = self.path(ENTITIES_FILE);
        if !path.exists() {
            return Ok(EntitySnapshot::default());
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn save_snapshot(&self, snapshot: &EntitySnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        Self::write_atomic(&self.path(ENTITIES_FILE), &bytes)?;
        Ok(())
    }
}

/// Project the store into its on-disk wire form.
///
/// Canonicalization is clocked with each entity's own update timestamp so
/// that writing a snapshot never bumps logical time; rows flagged deleted
/// are left out (their ids survive in the dirty set and push as tombstones).
pub fn snapshot_of(store: &Store) -> EntitySnapshot {
    let clock = |updated_at: &Option<String>| {
        updated_at
            .as_deref()
            .and_then(parse_rfc3339)
            .unwrap_or_else(chrono::Utc::now)
    };

    let mut snapshot = EntitySnapshot::default();
    for task in store.tasks().values().filter(|t| !t.deleted) {
        snapshot.task.push(canonicalize_at(task, clock(&task.updated_at)));
    }
    for goal in store.goals().values().filter(|g| !g.deleted) {
        snapshot
            .goal
            .push(canonicalize_goal_at(goal, clock(&goal.updated_at)));
    }
    for account in store.accounts().values().filter(|a| !a.deleted) {
        snapshot
            .account
            .push(canonicalize_account_at(account, clock(&account.updated_at)));
    }
    for line in store.forecast_lines().values().filter(|l| !l.deleted) {
        snapshot
            .forecast_line
            .push(canonicalize_forecast_line_at(line, clock(&line.updated_at)));
    }
    for movement in store.movements().values().filter(|m| !m.deleted) {
        snapshot
            .movement
            .push(canonicalize_movement_at(movement, clock(&movement.updated_at)));
    }

    // Deterministic file contents for identical store states.
    snapshot.task.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot.goal.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot.account.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot.forecast_line.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot.movement.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot
}

/// Rehydrate a snapshot into the store, recomputing the derived task indexes.
pub fn restore_into(store: &mut Store, snapshot: &EntitySnapshot) {
    for wire in &snapshot.task {
        store.restore_task(hydrate(wire));
    }
    for wire in &snapshot.goal {
        store.restore_goal(hydrate_goal(wire));
    }
    for wire in &snapshot.account {
        store.restore_account(hydrate_account(wire));
    }
    for wire in &snapshot.forecast_line {
        store.restore_forecast_line(hydrate_forecast_line(wire));
    }
    for wire in &snapshot.movement {
        store.restore_movement(hydrate_movement(wire));
    }
    store.recompute_task_levels();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::Goal;
    use crate::tasks::Task;
    use tempfile::tempdir;

    #[test]
    fn missing_files_load_as_empty_state() {
        let dir = tempdir().expect("tempdir");
        let state = LocalStateStore::new(dir.path()).expect("state dir");
        assert!(state.load_watermarks().unwrap().is_empty());
        assert!(state.load_dirty().unwrap().is_empty());
        assert!(state.load_snapshot().unwrap().task.is_empty());
    }

    #[test]
    fn watermarks_round_trip_as_opaque_strings() {
        let dir = tempdir().expect("tempdir");
        let state = LocalStateStore::new(dir.path()).expect("state dir");

        let mut watermarks = Watermarks::new();
        watermarks.insert(EntityKind::Task, 42);
        watermarks.insert(EntityKind::Goal, 7);
        state.save_watermarks(&watermarks).unwrap();

        let raw: BTreeMap<String, String> = serde_json::from_slice(
            &std::fs::read(dir.path().join("watermarks.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["task"], "42");

        assert_eq!(state.load_watermarks().unwrap(), watermarks);
    }

    #[test]
    fn dirty_set_round_trips() {
        let dir = tempdir().expect("tempdir");
        let state = LocalStateStore::new(dir.path()).expect("state dir");

        let mut dirty = DirtySet::default();
        dirty.insert(EntityKind::Task, "t1");
        dirty.insert(EntityKind::Movement, "m1");
        state.save_dirty(&dirty).unwrap();
        assert_eq!(state.load_dirty().unwrap(), dirty);
    }

    #[test]
    fn snapshot_round_trip_preserves_timestamps_and_levels() {
        let dir = tempdir().expect("tempdir");
        let state = LocalStateStore::new(dir.path()).expect("state dir");

        let mut store = Store::default();
        let mut parent = Task::new("padre");
        parent.id = "p".to_string();
        store.upsert_task(parent);
        let mut child = Task::new("hija");
        child.id = "c".to_string();
        child.parent_id = Some("p".to_string());
        store.upsert_task(child);
        store.upsert_goal(Goal::new("meta"));

        let before_ts = store.task("c").unwrap().updated_at.clone();
        state.save_snapshot(&snapshot_of(&store)).unwrap();

        let mut restored = Store::default();
        restore_into(&mut restored, &state.load_snapshot().unwrap());
        assert_eq!(restored.tasks().len(), 2);
        assert_eq!(restored.goals().len(), 1);
        assert_eq!(restored.task("c").unwrap().level, 1);
        assert_eq!(restored.task("c").unwrap().updated_at, before_ts);
    }

    #[test]
    fn deleted_rows_are_left_out_of_the_snapshot() {
        let mut store = Store::default();
        let mut task = Task::new("borrar");
        task.id = "t1".to_string();
        store.upsert_task(task);
        store.delete_task("t1");

        let snapshot = snapshot_of(&store);
        assert!(snapshot.task.is_empty());
        assert!(store.dirty().contains(EntityKind::Task, "t1"));
    }
}
