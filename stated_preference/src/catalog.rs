use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::config::*;

/// The number of user groups the tasks are balanced across.
pub const NUM_BLOCKS: usize = 4;

/// A task is only shown if it has exactly this number of alternatives.
pub const ALTERNATIVES_PER_TASK: usize = 3;

/// The valid tasks of a scenario dataset, partitioned into blocks.
///
/// The catalog is a pure function of the dataset: building it twice from the
/// same rows yields the same task order and the same blocks.
#[derive(PartialEq, Debug, Clone)]
pub struct TaskCatalog {
    rows_by_task: BTreeMap<TaskId, Vec<ScenarioRow>>,
    all_tasks: Vec<TaskId>,
    blocks: Vec<Vec<TaskId>>,
}

impl TaskCatalog {
    pub fn build(rows: &[ScenarioRow]) -> TaskCatalog {
        TaskCatalog::with_blocks(rows, NUM_BLOCKS)
    }

    pub fn with_blocks(rows: &[ScenarioRow], num_blocks: usize) -> TaskCatalog {
        let mut grouped: BTreeMap<TaskId, Vec<ScenarioRow>> = BTreeMap::new();
        for r in rows {
            grouped.entry(r.task_id).or_default().push(r.clone());
        }

        let mut rows_by_task: BTreeMap<TaskId, Vec<ScenarioRow>> = BTreeMap::new();
        for (task_id, task_rows) in grouped {
            if task_rows.len() == ALTERNATIVES_PER_TASK {
                rows_by_task.insert(task_id, task_rows);
            } else {
                warn!(
                    "TaskCatalog: dropping task {}: expected {} alternatives, found {}",
                    task_id,
                    ALTERNATIVES_PER_TASK,
                    task_rows.len()
                );
            }
        }

        // BTreeMap keys come out sorted.
        let all_tasks: Vec<TaskId> = rows_by_task.keys().cloned().collect();
        let blocks = split_blocks(&all_tasks, num_blocks.max(1));
        info!(
            "TaskCatalog: {} valid tasks in {} blocks of sizes {:?}",
            all_tasks.len(),
            blocks.len(),
            blocks.iter().map(|b| b.len()).collect::<Vec<usize>>()
        );
        TaskCatalog {
            rows_by_task,
            all_tasks,
            blocks,
        }
    }

    /// All the valid task ids, sorted.
    pub fn all_tasks(&self) -> &[TaskId] {
        &self.all_tasks
    }

    pub fn blocks(&self) -> &[Vec<TaskId>] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The tasks assigned to a group, in increasing id order.
    pub fn block(&self, group_index: usize) -> &[TaskId] {
        self.blocks
            .get(group_index)
            .map(|b| b.as_slice())
            .unwrap_or(&[])
    }

    /// The alternatives of a task in dataset order. Empty for an unknown task.
    pub fn rows(&self, task_id: TaskId) -> &[ScenarioRow] {
        self.rows_by_task
            .get(&task_id)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    pub fn group_index(&self, session_id: &str) -> usize {
        group_index(session_id, self.num_blocks())
    }
}

/// Splits the tasks into `num_blocks` contiguous blocks whose sizes differ by
/// at most one. The first blocks receive the extra elements.
pub fn split_blocks(tasks: &[TaskId], num_blocks: usize) -> Vec<Vec<TaskId>> {
    if num_blocks == 0 {
        return vec![];
    }
    let base = tasks.len() / num_blocks;
    let extra = tasks.len() % num_blocks;
    let mut res: Vec<Vec<TaskId>> = Vec::with_capacity(num_blocks);
    let mut start = 0;
    for idx in 0..num_blocks {
        let size = if idx < extra { base + 1 } else { base };
        res.push(tasks[start..start + size].to_vec());
        start += size;
    }
    res
}

/// Maps a session identity to a block.
///
/// This uses a cryptographic hash so that the assignment is stable across runs
/// and processes, and evenly spread for random identities.
pub fn group_index(session_id: &str, num_blocks: usize) -> usize {
    if num_blocks == 0 {
        return 0;
    }
    let hex = sha256::digest(session_id);
    let prefix: u64 = u64::from_str_radix(&hex[..16], 16).unwrap_or(0);
    let idx = (prefix % num_blocks as u64) as usize;
    debug!("group_index: session {} -> group {}", session_id, idx);
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(task_id: TaskId, alternative: Alternative) -> ScenarioRow {
        ScenarioRow {
            task_id,
            alternative,
            time_minutes: 10.0,
            cost_inr: 20.0,
            wait_minutes: 2.0,
        }
    }

    fn full_task(task_id: TaskId) -> Vec<ScenarioRow> {
        Alternative::ALL.iter().map(|a| row(task_id, *a)).collect()
    }

    #[test]
    fn drops_tasks_without_three_alternatives() {
        let mut rows = full_task(7);
        rows.extend(full_task(2));
        rows.push(row(5, Alternative::Walking));
        rows.push(row(5, Alternative::ERickshaw));
        rows.extend(full_task(9));
        rows.push(row(9, Alternative::Walking));

        let catalog = TaskCatalog::build(&rows);
        assert_eq!(catalog.all_tasks(), &[2, 7]);
        assert!(catalog.rows(5).is_empty());
        assert!(catalog.rows(9).is_empty());
        for t in catalog.all_tasks() {
            assert_eq!(catalog.rows(*t).len(), ALTERNATIVES_PER_TASK);
        }
    }

    #[test]
    fn split_is_near_equal() {
        let tasks: Vec<TaskId> = (1..=10).collect();
        let blocks = split_blocks(&tasks, 4);
        assert_eq!(
            blocks,
            vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8], vec![9, 10]]
        );
    }

    #[test]
    fn split_covers_every_task_once() {
        for n in 0..30 {
            let tasks: Vec<TaskId> = (0..n).collect();
            let blocks = split_blocks(&tasks, NUM_BLOCKS);
            assert_eq!(blocks.len(), NUM_BLOCKS);
            let flat: Vec<TaskId> = blocks.iter().flatten().cloned().collect();
            assert_eq!(flat, tasks);
            let max = blocks.iter().map(|b| b.len()).max().unwrap();
            let min = blocks.iter().map(|b| b.len()).min().unwrap();
            assert!(max - min <= 1);
        }
    }

    #[test]
    fn few_tasks_leave_empty_blocks() {
        let mut rows = full_task(1);
        rows.extend(full_task(2));
        let catalog = TaskCatalog::build(&rows);
        assert_eq!(catalog.block(0), &[1]);
        assert_eq!(catalog.block(1), &[2]);
        assert!(catalog.block(2).is_empty());
        assert!(catalog.block(3).is_empty());
        assert!(catalog.block(17).is_empty());
    }

    #[test]
    fn build_is_deterministic() {
        let mut rows: Vec<ScenarioRow> = Vec::new();
        for t in [12, 3, 8, 1, 5, 10, 4, 7, 2, 6, 9, 11] {
            rows.extend(full_task(t));
        }
        let c1 = TaskCatalog::build(&rows);
        rows.reverse();
        let c2 = TaskCatalog::build(&rows);
        assert_eq!(c1.blocks(), c2.blocks());
        assert_eq!(c1.block(2), &[7, 8, 9]);
    }

    #[test]
    fn group_index_is_stable() {
        let a = group_index("9b2d6c0e-3f4a-4d8e-b1c2-0a9f8e7d6c5b", NUM_BLOCKS);
        let b = group_index("9b2d6c0e-3f4a-4d8e-b1c2-0a9f8e7d6c5b", NUM_BLOCKS);
        assert_eq!(a, b);
        assert!(a < NUM_BLOCKS);
        let mut seen = [false; NUM_BLOCKS];
        for i in 0..200 {
            seen[group_index(&format!("session-{}", i), NUM_BLOCKS)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
