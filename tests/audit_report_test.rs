//! Integrity auditor against a real store.

mod common;

use annotask::domain::models::{Assignment, AuditReport, InsertOutcome, Severity};
use annotask::domain::ports::AssignmentStore;
use annotask::services::write_report_json;
use chrono::{Duration, Utc};
use common::Fixture;

#[tokio::test]
async fn clean_distribution_has_no_critical_issues() {
    let f = Fixture::new().await;
    let project = f.project("Clean").await;
    f.members(&project, 4).await;
    f.tasks(&project, 4).await;
    f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();

    let report = f.auditor().audit(None).await.unwrap();
    assert!(!report.has_critical());
    assert_eq!(report.counts.assignments, 12);
    assert_eq!(report.counts.multi_covered_tasks, 4);
    assert_eq!(report.overlap_distribution.len(), 1);
    assert_eq!(report.overlap_distribution[0].overlap, 3);
    assert_eq!(report.overlap_distribution[0].task_count, 4);
    assert_eq!(report.pool_sizes.len(), 1);
    assert_eq!(report.pool_sizes[0].active_members, 4);
}

#[tokio::test]
async fn manual_duplicate_is_exactly_one_critical() {
    let f = Fixture::new().await;
    let project = f.project("Dupes").await;
    f.tag("legal").await;
    // Two members: overlap 2, so one extra row keeps every task at or below 3.
    let workers = f.members(&project, 2).await;
    f.verify(&workers[0], "legal").await;
    let tasks = f.tasks(&project, 2).await;
    f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();

    // Without the unique index a second row for the pair slips through.
    sqlx::query("DROP INDEX idx_assignments_task_worker")
        .execute(&f.pool)
        .await
        .unwrap();
    let dup = Assignment::new(project.id, tasks[0].id, workers[0].id, Utc::now(), Duration::hours(24));
    assert_eq!(f.store.insert_assignment(&dup).await.unwrap(), InsertOutcome::Created);

    let report = f.auditor().audit(None).await.unwrap();
    assert_eq!(report.issues.len(), 1, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.count(Severity::Critical), 1);
    let critical = report.issues_with(Severity::Critical).next().unwrap();
    let pairs = critical.details["pairs"].as_array().unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0]["rows"], 2);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r == "Fix duplicate assignments immediately"));
}

#[tokio::test]
async fn duplicate_past_the_ceiling_also_warns() {
    let f = Fixture::new().await;
    let project = f.project("Crowded").await;
    let workers = f.members(&project, 3).await;
    let tasks = f.tasks(&project, 2).await;
    f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();

    sqlx::query("DROP INDEX idx_assignments_task_worker")
        .execute(&f.pool)
        .await
        .unwrap();
    let dup = Assignment::new(project.id, tasks[0].id, workers[0].id, Utc::now(), Duration::hours(24));
    f.store.insert_assignment(&dup).await.unwrap();

    let report = f.auditor().audit(None).await.unwrap();
    assert_eq!(report.count(Severity::Critical), 1);
    // Four rows on one task.
    assert!(report
        .issues_with(Severity::Warning)
        .any(|i| i.message.contains("more than 3")));
}

#[tokio::test]
async fn idle_members_and_missing_expertise_are_warnings() {
    let f = Fixture::new().await;
    let project = f.project("Idle").await;
    f.members(&project, 4).await;
    f.tasks(&project, 1).await;
    f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();

    let report = f.auditor().audit(Some(project.id)).await.unwrap();
    let idle = report
        .issues_with(Severity::Warning)
        .find(|i| i.message.contains("no assignments"))
        .expect("idle warning");
    assert_eq!(idle.details["members"].as_array().unwrap().len(), 1);

    assert!(report
        .issues_with(Severity::Warning)
        .any(|i| i.message == "No verified expertise grants"));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r == "Set up expertise tags and verify worker skills"));
    assert!(!report.recommendations.iter().any(|r| r.starts_with("Need at least")));
}

#[tokio::test]
async fn small_pool_and_uncovered_tasks_are_reported() {
    let f = Fixture::new().await;
    let project = f.project("Thin").await;
    f.tag("audio").await;
    let workers = f.members(&project, 1).await;
    f.verify(&workers[0], "audio").await;
    f.tasks(&project, 2).await;

    let report = f.auditor().audit(None).await.unwrap();
    assert_eq!(report.count(Severity::Info), 1);
    assert_eq!(report.expertise.verified_grants, 1);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r == "Need at least 3 approved workers for full 3-way overlap"));
    assert!(!report.issues.iter().any(|i| i.message == "No verified expertise grants"));
}

#[tokio::test]
async fn scoped_audit_ignores_other_projects() {
    let f = Fixture::new().await;
    let noisy = f.project("Noisy").await;
    let quiet = f.project("Quiet").await;
    let workers = f.members(&noisy, 1).await;
    let tasks = f.tasks(&noisy, 1).await;
    f.members(&quiet, 2).await;
    f.tasks(&quiet, 2).await;
    let engine = f.engine();
    engine.adaptive_assign_project_tasks(noisy.id).await.unwrap();
    engine.adaptive_assign_project_tasks(quiet.id).await.unwrap();

    sqlx::query("DROP INDEX idx_assignments_task_worker")
        .execute(&f.pool)
        .await
        .unwrap();
    let dup = Assignment::new(noisy.id, tasks[0].id, workers[0].id, Utc::now(), Duration::hours(1));
    f.store.insert_assignment(&dup).await.unwrap();

    let global = f.auditor().audit(None).await.unwrap();
    assert!(global.has_critical());

    let scoped = f.auditor().audit(Some(quiet.id)).await.unwrap();
    assert!(!scoped.has_critical());
    assert_eq!(scoped.project_id, Some(quiet.id));
    assert_eq!(scoped.counts.assignments, 4);
    assert!(scoped.pool_sizes.iter().all(|p| p.project_id == quiet.id));
}

#[tokio::test]
async fn report_written_as_json_reads_back() {
    let f = Fixture::new().await;
    let project = f.project("Export").await;
    f.members(&project, 3).await;
    f.tasks(&project, 3).await;
    f.engine().adaptive_assign_project_tasks(project.id).await.unwrap();

    let report = f.auditor().with_top_workers(2).audit(None).await.unwrap();
    assert_eq!(report.top_workers.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("audit.json");
    write_report_json(&report, &path).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value.get("overlapDistribution").is_some());
    assert!(value.get("generatedAt").is_some());

    let parsed: AuditReport = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, report);
}
