//! Parent-pointer tree helpers for tasks.
//!
//! Tasks form a tree through `parent_id`, but the pointers come from user
//! edits and remote merges, so cycles and dangling references are possible
//! and must be defended against. Depth and children indexes are always
//! recomputed from the pointers, never trusted from storage.

use std::collections::{HashMap, HashSet};

use super::Task;

/// Gap used when appending a sibling past the current extremes.
pub const ORDER_GAP: f64 = 100.0;

/// Depth of one task: ancestor hops to a root. A cycle or a dangling parent
/// reference floors the task to level 0.
pub fn level_of(tasks: &HashMap<String, Task>, id: &str) -> u32 {
    let Some(task) = tasks.get(id) else {
        return 0;
    };
    let mut visited: HashSet<&str> = HashSet::from([id]);
    let mut hops = 0u32;
    let mut current = task.parent_id.as_deref();
    while let Some(parent_id) = current {
        let Some(parent) = tasks.get(parent_id) else {
            return 0;
        };
        if !visited.insert(parent_id) {
            return 0;
        }
        hops += 1;
        current = parent.parent_id.as_deref();
    }
    hops
}

/// Recompute the `level` field of every task in the collection.
pub fn recompute_levels(tasks: &mut HashMap<String, Task>) {
    let ids: Vec<String> = tasks.keys().cloned().collect();
    for id in ids {
        let level = level_of(tasks, &id);
        if let Some(task) = tasks.get_mut(&id) {
            task.level = level;
        }
    }
}

/// Children ids grouped by parent, each group sorted by `(order, id)`.
/// Root tasks are grouped under `None`.
pub fn children_index(
    tasks: &HashMap<String, Task>,
) -> HashMap<Option<String>, Vec<String>> {
    let mut index: HashMap<Option<String>, Vec<String>> = HashMap::new();
    for task in tasks.values() {
        // A parent pointer that is dangling or cyclic groups as a root.
        let parent = task
            .parent_id
            .clone()
            .filter(|p| tasks.contains_key(p) && level_of(tasks, &task.id) > 0);
        index.entry(parent).or_default().push(task.id.clone());
    }
    for siblings in index.values_mut() {
        siblings.sort_by(|a, b| {
            let oa = tasks[a].order;
            let ob = tasks[b].order;
            oa.partial_cmp(&ob)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
    }
    index
}

/// Sort key for inserting a sibling between `before` and `after` without
/// renumbering: midpoint between two neighbours, or a fixed gap past the
/// extremes.
pub fn order_between(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (b + a) / 2.0,
        (Some(b), None) => b + ORDER_GAP,
        (None, Some(a)) => a - ORDER_GAP,
        (None, None) => ORDER_GAP,
    }
}

/// Reassign consecutive integer sort keys to the children of `parent`.
///
/// Repeated midpoint insertion eventually exhausts floating-point precision;
/// this is the maintenance pass that restores headroom. Returns the ids whose
/// `order` actually changed.
pub fn renumber_siblings(
    tasks: &mut HashMap<String, Task>,
    parent: Option<&str>,
) -> Vec<String> {
    let index = children_index(tasks);
    let Some(siblings) = index.get(&parent.map(str::to_string)) else {
        return Vec::new();
    };
    let mut changed = Vec::new();
    for (position, id) in siblings.iter().enumerate() {
        let next_order = (position + 1) as f64;
        if let Some(task) = tasks.get_mut(id) {
            if task.order != next_order {
                task.order = next_order;
                changed.push(id.clone());
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with(id: &str, parent: Option<&str>, order: f64) -> Task {
        Task {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            order,
            ..Task::new(id)
        }
    }

    fn collection(tasks: Vec<Task>) -> HashMap<String, Task> {
        tasks.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    #[test]
    fn levels_follow_parent_chains_and_floor_cycles() {
        let mut tasks = collection(vec![
            task_with("a", None, 1.0),
            task_with("b", Some("a"), 1.0),
            task_with("c", Some("b"), 1.0),
            task_with("d", Some("d"), 1.0),
        ]);
        recompute_levels(&mut tasks);
        assert_eq!(tasks["a"].level, 0);
        assert_eq!(tasks["b"].level, 1);
        assert_eq!(tasks["c"].level, 2);
        assert_eq!(tasks["d"].level, 0);
    }

    #[test]
    fn mutual_cycle_and_dangling_parent_floor_to_zero() {
        let mut tasks = collection(vec![
            task_with("x", Some("y"), 1.0),
            task_with("y", Some("x"), 1.0),
            task_with("z", Some("missing"), 1.0),
        ]);
        recompute_levels(&mut tasks);
        assert_eq!(tasks["x"].level, 0);
        assert_eq!(tasks["y"].level, 0);
        assert_eq!(tasks["z"].level, 0);
    }

    #[test]
    fn children_sorted_by_fractional_order() {
        let tasks = collection(vec![
            task_with("root", None, 1.0),
            task_with("t1", Some("root"), 200.0),
            task_with("t2", Some("root"), 100.0),
            task_with("t3", Some("root"), 150.0),
        ]);
        let index = children_index(&tasks);
        assert_eq!(
            index[&Some("root".to_string())],
            vec!["t2".to_string(), "t3".to_string(), "t1".to_string()]
        );
    }

    #[test]
    fn order_between_uses_midpoint_and_fixed_gap() {
        assert_eq!(order_between(Some(100.0), Some(200.0)), 150.0);
        assert_eq!(order_between(Some(300.0), None), 300.0 + ORDER_GAP);
        assert_eq!(order_between(None, Some(100.0)), 100.0 - ORDER_GAP);
        assert_eq!(order_between(None, None), ORDER_GAP);
    }

    #[test]
    fn renumber_restores_integer_orders() {
        let mut tasks = collection(vec![
            task_with("root", None, 1.0),
            task_with("t1", Some("root"), 0.0078125),
            task_with("t2", Some("root"), 0.015625),
            task_with("t3", Some("root"), 7.25),
        ]);
        let changed = renumber_siblings(&mut tasks, Some("root"));
        assert_eq!(changed.len(), 3);
        assert_eq!(tasks["t1"].order, 1.0);
        assert_eq!(tasks["t2"].order, 2.0);
        assert_eq!(tasks["t3"].order, 3.0);
    }
}
