//! Timeout sweep end to end: expiry, backfill and isolation.

mod common;

use std::collections::HashSet;

use annotask::domain::models::{AssignmentStatus, AssignmentStatusKind, SweepStage};
use annotask::domain::ports::AssignmentStore;
use annotask::services::{ReassignmentReactor, TimeoutProcessor};
use chrono::Utc;
use common::Fixture;

#[tokio::test]
async fn overdue_rows_expire_and_project_is_backfilled() {
    let f = Fixture::new().await;
    let project = f.project("Backfill").await;
    let first = f.members(&project, 3).await;
    f.tasks(&project, 2).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();

    // Three fresh workers arrive, then everything outstanding goes overdue.
    f.members(&project, 3).await;
    f.backdate_due(&project, 1).await;

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine));
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.candidates, 6);
    assert_eq!(report.expired, 6);
    assert!(report.is_clean());
    assert_eq!(report.backfills.len(), 1);
    assert_eq!(report.backfills[0].status, Some(AssignmentStatusKind::Assigned));
    assert_eq!(report.backfills[0].created_count, 6);

    let rows = f.assignments(&project).await;
    let fresh: Vec<_> = rows.iter().filter(|r| r.status == AssignmentStatus::Assigned).collect();
    assert_eq!(fresh.len(), 6);
    let original: HashSet<_> = first.iter().map(|w| w.id).collect();
    assert!(fresh.iter().all(|r| !original.contains(&r.worker_id)));
}

#[tokio::test]
async fn in_progress_rows_time_out_but_completed_do_not() {
    let f = Fixture::new().await;
    let project = f.project("Mixed").await;
    f.members(&project, 1).await;
    f.tasks(&project, 3).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();

    let rows = f.assignments(&project).await;
    let now = Utc::now();
    f.store
        .transition_assignment(rows[0].id, AssignmentStatus::Assigned, AssignmentStatus::InProgress, now)
        .await
        .unwrap();
    f.store
        .transition_assignment(rows[1].id, AssignmentStatus::Assigned, AssignmentStatus::Completed, now)
        .await
        .unwrap();
    f.backdate_due(&project, 2).await;

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine));
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.expired, 2);

    let completed = f.store.get_assignment(rows[1].id).await.unwrap().unwrap();
    assert_eq!(completed.status, AssignmentStatus::Completed);
    let started = f.store.get_assignment(rows[0].id).await.unwrap().unwrap();
    assert_eq!(started.status, AssignmentStatus::Expired);
    assert!(started.started_at.is_some());
}

#[tokio::test]
async fn sweep_leaves_rows_that_are_not_due() {
    let f = Fixture::new().await;
    let project = f.project("Fresh").await;
    f.members(&project, 2).await;
    f.tasks(&project, 2).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine));
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.candidates, 0);
    assert!(report.backfills.is_empty());
    assert!(f
        .assignments(&project)
        .await
        .iter()
        .all(|r| r.status == AssignmentStatus::Assigned));
}

#[tokio::test]
async fn backfill_failure_in_one_project_does_not_stop_others() {
    let f = Fixture::new().await;
    let good = f.project("Good").await;
    let bad = f.project("Bad").await;
    for p in [&good, &bad] {
        f.members(p, 1).await;
        f.tasks(p, 1).await;
    }
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(good.id).await.unwrap();
    engine.adaptive_assign_project_tasks(bad.id).await.unwrap();
    f.backdate_due(&good, 1).await;
    f.backdate_due(&bad, 1).await;

    // Corrupt one membership so loading the bad pool fails.
    sqlx::query("UPDATE pool_memberships SET joined_at = 'garbage' WHERE project_id = ?")
        .bind(bad.id.to_string())
        .execute(&f.pool)
        .await
        .unwrap();

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine));
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.expired, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, SweepStage::Backfill);
    assert_eq!(report.failures[0].project_id, Some(bad.id));
    assert_eq!(report.backfills.len(), 1);
    assert_eq!(report.backfills[0].project_id, good.id);
}

#[tokio::test]
async fn undecodable_row_is_recorded_and_siblings_still_expire() {
    let f = Fixture::new().await;
    let project = f.project("Damaged").await;
    f.members(&project, 1).await;
    f.tasks(&project, 2).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();
    f.backdate_due(&project, 1).await;

    let rows = f.assignments(&project).await;
    let (damaged, sibling) = (&rows[0], &rows[1]);
    sqlx::query("UPDATE assignments SET due_at = '2000-bad' WHERE id = ?")
        .bind(damaged.id.to_string())
        .execute(&f.pool)
        .await
        .unwrap();

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine));
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.expired, 1);
    assert_eq!(report.row_failures(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.stage, SweepStage::Expire);
    assert_eq!(failure.assignment_id, Some(damaged.id));
    assert_eq!(failure.project_id, Some(project.id));

    let expired = f.store.get_assignment(sibling.id).await.unwrap().unwrap();
    assert_eq!(expired.status, AssignmentStatus::Expired);
    assert_eq!(report.backfills.len(), 1);
}

#[tokio::test]
async fn failed_expiry_is_recorded_and_siblings_still_expire() {
    let f = Fixture::new().await;
    let project = f.project("Stuck").await;
    f.members(&project, 1).await;
    f.tasks(&project, 3).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(project.id).await.unwrap();
    f.backdate_due(&project, 1).await;

    let rows = f.assignments(&project).await;
    let stuck = rows[1].id;
    sqlx::query(&format!(
        "CREATE TRIGGER refuse_expiry BEFORE UPDATE ON assignments
         WHEN NEW.id = '{stuck}' AND NEW.status = 'expired'
         BEGIN SELECT RAISE(ABORT, 'row is locked for audit'); END"
    ))
    .execute(&f.pool)
    .await
    .unwrap();

    let processor = TimeoutProcessor::new(ReassignmentReactor::new(engine)).with_batch_size(2);
    let report = processor.run_sweep(None).await.unwrap();
    assert_eq!(report.candidates, 3);
    assert_eq!(report.expired, 2);
    assert_eq!(report.row_failures(), 1);
    assert_eq!(report.visited(), 3);
    let failure = &report.failures[0];
    assert_eq!(failure.stage, SweepStage::Expire);
    assert_eq!(failure.assignment_id, Some(stuck));
    assert_eq!(failure.project_id, Some(project.id));
    assert!(failure.error.contains("row is locked for audit"));

    for row in rows.iter().filter(|r| r.id != stuck) {
        let loaded = f.store.get_assignment(row.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AssignmentStatus::Expired);
    }
    let held = f.store.get_assignment(stuck).await.unwrap().unwrap();
    assert_eq!(held.status, AssignmentStatus::Assigned);
}
