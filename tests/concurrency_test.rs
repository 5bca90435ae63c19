//! Concurrent triggers against a multi-connection, file-backed store.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use annotask::domain::models::AssignmentStatus;
use annotask::services::{AssignmentEngine, ReassignmentReactor, TimeoutProcessor};
use common::Fixture;
use futures::future::join_all;

fn assert_no_duplicate_pairs(rows: &[annotask::domain::models::Assignment]) {
    let mut seen = HashSet::new();
    for row in rows.iter().filter(|r| r.status != AssignmentStatus::Expired) {
        assert!(seen.insert((row.task_id, row.worker_id)), "duplicate active pair {row:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_passes_on_one_project_create_exact_coverage() {
    let f = Fixture::file_backed(5).await;
    let project = f.project("Race").await;
    f.members(&project, 5).await;
    f.tasks(&project, 10).await;

    let engine = f.engine();
    let passes = (0..8).map(|_| {
        let engine = engine.clone();
        let id = project.id;
        tokio::spawn(async move { engine.adaptive_assign_project_tasks(id).await })
    });
    let results = join_all(passes).await;

    let created: u32 = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().created_count)
        .sum();
    assert_eq!(created, 30);

    let rows = f.assignments(&project).await;
    assert_eq!(rows.len(), 30);
    assert_no_duplicate_pairs(&rows);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engines_sharing_locks_serialize_per_project() {
    let f = Fixture::file_backed(5).await;
    let project = f.project("Shared").await;
    f.members(&project, 4).await;
    f.tasks(&project, 6).await;

    let first = f.engine();
    let second = Arc::new(AssignmentEngine::new(f.store.clone()).with_locks(first.locks().clone()));

    let (a, b) = tokio::join!(
        first.adaptive_assign_project_tasks(project.id),
        second.adaptive_assign_project_tasks(project.id)
    );
    assert_eq!(a.unwrap().created_count + b.unwrap().created_count, 18);

    let rows = f.assignments(&project).await;
    assert_eq!(rows.len(), 18);
    assert_no_duplicate_pairs(&rows);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engines_without_shared_locks_serialize_through_the_lease() {
    let f = Fixture::file_backed(5).await;
    let project = f.project("Separate processes").await;
    f.members(&project, 5).await;
    f.tasks(&project, 12).await;

    // Independent engines stand in for separate processes on one file.
    let passes = (0..4).map(|_| {
        let engine = Arc::new(AssignmentEngine::new(f.store.clone()));
        let id = project.id;
        tokio::spawn(async move { engine.adaptive_assign_project_tasks(id).await })
    });
    let created: u32 = join_all(passes)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().created_count)
        .sum();
    assert_eq!(created, 36);

    let rows = f.assignments(&project).await;
    assert_eq!(rows.len(), 36);
    assert_no_duplicate_pairs(&rows);

    let (leases,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM project_leases")
        .fetch_one(&f.pool)
        .await
        .unwrap();
    assert_eq!(leases, 0, "every pass released its lease");
}

#[tokio::test]
async fn held_lease_makes_other_engines_report_busy() {
    let f = Fixture::new().await;
    let project = f.project("Held").await;
    f.members(&project, 2).await;
    f.tasks(&project, 1).await;

    let holder = f.engine();
    let scope = holder.enter_project(project.id).await.unwrap();

    let other = AssignmentEngine::new(f.store.clone()).with_lease_wait(std::time::Duration::from_millis(60));
    let err = other.adaptive_assign_project_tasks(project.id).await.unwrap_err();
    assert!(matches!(err, annotask::DomainError::ProjectBusy(id) if id == project.id));
    assert!(f.assignments(&project).await.is_empty());

    holder.leave_project(scope).await;
    let result = other.adaptive_assign_project_tasks(project.id).await.unwrap();
    assert_eq!(result.created_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_projects_run_in_parallel() {
    let f = Fixture::file_backed(5).await;
    let mut projects = Vec::new();
    for i in 0..4 {
        let p = f.project(&format!("P{i}")).await;
        f.members(&p, 3).await;
        f.tasks(&p, 5).await;
        projects.push(p);
    }

    let engine = f.engine();
    let passes = projects.iter().map(|p| {
        let engine = engine.clone();
        let id = p.id;
        tokio::spawn(async move { engine.adaptive_assign_project_tasks(id).await })
    });
    for result in join_all(passes).await {
        assert_eq!(result.unwrap().unwrap().created_count, 15);
    }
    assert!(engine.locks().len().await <= projects.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_and_assignment_passes_interleave_safely() {
    let f = Fixture::file_backed(5).await;
    let project = f.project("Churn").await;
    f.members(&project, 6).await;
    f.tasks(&project, 8).await;

    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();
    f.backdate_due(&project, 1).await;

    let reactor = ReassignmentReactor::new(engine.clone());
    let processor = Arc::new(TimeoutProcessor::new(reactor).with_batch_size(5));

    let sweep = {
        let processor = processor.clone();
        tokio::spawn(async move { processor.run_sweep(None).await })
    };
    let passes: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let id = project.id;
            tokio::spawn(async move { engine.adaptive_assign_project_tasks(id).await })
        })
        .collect();

    let report = sweep.await.unwrap().unwrap();
    for pass in join_all(passes).await {
        pass.unwrap().unwrap();
    }

    assert_eq!(report.expired, 24);
    assert!(report.failures.is_empty());

    let rows = f.assignments(&project).await;
    assert_no_duplicate_pairs(&rows);
    let active = rows.iter().filter(|r| r.status == AssignmentStatus::Assigned).count();
    assert_eq!(active, 24, "every task back at overlap 3");
}
