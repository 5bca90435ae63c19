//! Property-based tests for overlap and distribution invariants
//!
//! 1. The overlap step function is capped, monotonic and never exceeds the pool
//! 2. A pass covers every task to exactly the overlap target
//! 3. Untagged load stays within one assignment across the pool

mod common;

use std::collections::{HashMap, HashSet};

use annotask::domain::models::{overlap_for_pool_size, MAX_OVERLAP};
use common::Fixture;
use proptest::prelude::*;
use uuid::Uuid;

proptest! {
    #[test]
    fn prop_overlap_steps(n in 0u32..10_000) {
        let overlap = overlap_for_pool_size(n);
        match n {
            0 | 1 => prop_assert_eq!(overlap, 1),
            2 => prop_assert_eq!(overlap, 2),
            _ => prop_assert_eq!(overlap, MAX_OVERLAP),
        }
        if n >= 1 {
            prop_assert!(overlap <= n);
        }
    }

    #[test]
    fn prop_overlap_monotonic(a in 0u32..100, b in 0u32..100) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(overlap_for_pool_size(lo) <= overlap_for_pool_size(hi));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_pass_reaches_target_with_balanced_load(workers in 1usize..7, tasks in 0usize..9) {
        let (rows, overlap) = tokio_test::block_on(async {
            let f = Fixture::new().await;
            let project = f.project("Prop").await;
            f.members(&project, workers).await;
            f.tasks(&project, tasks).await;
            let result = f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();
            (f.assignments(&project).await, result.overlap as usize)
        });

        prop_assert_eq!(rows.len(), tasks * overlap);

        let mut pairs = HashSet::new();
        let mut per_task: HashMap<Uuid, usize> = HashMap::new();
        let mut per_worker: HashMap<Uuid, usize> = HashMap::new();
        for row in &rows {
            prop_assert!(pairs.insert((row.task_id, row.worker_id)));
            *per_task.entry(row.task_id).or_insert(0) += 1;
            *per_worker.entry(row.worker_id).or_insert(0) += 1;
        }
        prop_assert!(per_task.values().all(|&c| c == overlap));

        if tasks > 0 {
            let max = per_worker.values().copied().max().unwrap_or(0);
            let min = if per_worker.len() < workers { 0 } else { per_worker.values().copied().min().unwrap_or(0) };
            prop_assert!(max - min <= 1, "spread {}..{} across {} workers", min, max, workers);
        }
    }
}
