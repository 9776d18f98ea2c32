use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;

use crate::config::*;

/// Pins the display order of the alternatives of each task.
///
/// The first request for a task draws a uniform permutation; every later
/// request returns the same order. Each session owns its own cache and its own
/// random generator.
#[derive(Debug, Clone)]
pub struct ShuffleCache {
    rng: StdRng,
    pinned: HashMap<TaskId, Vec<ScenarioRow>>,
}

impl ShuffleCache {
    pub fn from_entropy() -> ShuffleCache {
        ShuffleCache::with_rng(StdRng::from_entropy())
    }

    /// A reproducible cache, for replaying a session.
    pub fn seeded(seed: u64) -> ShuffleCache {
        ShuffleCache::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> ShuffleCache {
        ShuffleCache {
            rng,
            pinned: HashMap::new(),
        }
    }

    /// Returns the pinned order for the task, shuffling `rows` on first use.
    pub fn get_shuffled(&mut self, task_id: TaskId, rows: &[ScenarioRow]) -> &[ScenarioRow] {
        let rng = &mut self.rng;
        self.pinned.entry(task_id).or_insert_with(|| {
            let mut order = rows.to_vec();
            order.shuffle(rng);
            debug!(
                "ShuffleCache: pinned task {}: {:?}",
                task_id,
                order.iter().map(|r| r.alternative).collect::<Vec<_>>()
            );
            order
        })
    }

    /// The pinned order, if the task was already shown.
    pub fn get(&self, task_id: TaskId) -> Option<&[ScenarioRow]> {
        self.pinned.get(&task_id).map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}
