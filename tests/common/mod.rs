//! Common test utilities for integration tests
//!
//! Provides a migrated store plus helpers to build projects, pools and
//! tasks quickly.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use annotask::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, PoolConfig, SqliteAssignmentStore,
    SqliteAuditQueries, SqliteDirectoryStore,
};
use annotask::domain::models::{
    ApprovalStatus, Assignment, AssignmentFilter, ExpertiseGrant, ExpertiseTag, PoolMembership,
    Project, Task, Worker,
};
use annotask::domain::ports::{AssignmentStore, DirectoryStore};
use annotask::services::{AssignmentEngine, IntegrityAuditor};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

pub struct Fixture {
    pub pool: SqlitePool,
    pub directory: SqliteDirectoryStore,
    pub store: Arc<SqliteAssignmentStore>,
    /// Keeps a file-backed database alive.
    _dir: Option<TempDir>,
}

impl Fixture {
    /// In-memory, single-connection store.
    pub async fn new() -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        Self::from_pool(pool, None)
    }

    /// File-backed store with several connections, for concurrency tests.
    pub async fn file_backed(max_connections: u32) -> Self {
        let (dir, path) = temp_db_path();
        let config = PoolConfig { max_connections };
        let pool = initialize_database(&format!("sqlite:{}", path.display()), Some(config))
            .await
            .expect("file database");
        Self::from_pool(pool, Some(dir))
    }

    fn from_pool(pool: SqlitePool, dir: Option<TempDir>) -> Self {
        Self {
            directory: SqliteDirectoryStore::new(pool.clone()),
            store: Arc::new(SqliteAssignmentStore::new(pool.clone())),
            pool,
            _dir: dir,
        }
    }

    pub fn engine(&self) -> Arc<AssignmentEngine<SqliteAssignmentStore>> {
        Arc::new(AssignmentEngine::new(self.store.clone()))
    }

    pub fn auditor(&self) -> IntegrityAuditor<SqliteAuditQueries> {
        IntegrityAuditor::new(Arc::new(SqliteAuditQueries::new(self.pool.clone())))
    }

    pub async fn project(&self, title: &str) -> Project {
        let project = Project::new(title);
        self.directory.upsert_project(&project).await.unwrap();
        project
    }

    pub async fn worker(&self, status: ApprovalStatus) -> Worker {
        let worker = Worker::new(format!("{}@example.com", Uuid::new_v4()), status);
        self.directory.upsert_worker(&worker).await.unwrap();
        worker
    }

    /// Approved worker added to the project's pool.
    pub async fn member(&self, project: &Project) -> Worker {
        let worker = self.worker(ApprovalStatus::Approved).await;
        self.join(project, &worker).await;
        worker
    }

    /// `n` approved pool members, joined one millisecond apart.
    pub async fn members(&self, project: &Project, n: usize) -> Vec<Worker> {
        let base = Utc::now() - Duration::hours(1);
        let mut workers = Vec::with_capacity(n);
        for i in 0..n {
            let worker = self.worker(ApprovalStatus::Approved).await;
            let membership = PoolMembership::new(project.id, worker.id)
                .joined_at(base + Duration::milliseconds(i as i64));
            self.directory.upsert_membership(&membership).await.unwrap();
            workers.push(worker);
        }
        workers
    }

    pub async fn join(&self, project: &Project, worker: &Worker) {
        self.directory
            .upsert_membership(&PoolMembership::new(project.id, worker.id))
            .await
            .unwrap();
    }

    pub async fn leave(&self, project: &Project, worker: &Worker) {
        assert!(self.directory.deactivate_membership(project.id, worker.id).await.unwrap());
    }

    pub async fn tasks(&self, project: &Project, n: usize) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(n);
        for _ in 0..n {
            let task = Task::new(project.id);
            self.directory.insert_task(&task).await.unwrap();
            tasks.push(task);
        }
        tasks
    }

    pub async fn tagged_task(&self, project: &Project, tag: &str) -> Task {
        let task = Task::new(project.id).requiring(tag);
        self.directory.insert_task(&task).await.unwrap();
        task
    }

    pub async fn tag(&self, slug: &str) {
        self.directory.upsert_tag(&ExpertiseTag::new(slug, slug)).await.unwrap();
    }

    pub async fn verify(&self, worker: &Worker, tag: &str) {
        self.directory
            .upsert_grant(&ExpertiseGrant::verified(worker.id, tag))
            .await
            .unwrap();
    }

    pub async fn assignments(&self, project: &Project) -> Vec<Assignment> {
        self.store
            .list_assignments(AssignmentFilter {
                project_id: Some(project.id),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// Push every open assignment of the project past its due time.
    pub async fn backdate_due(&self, project: &Project, hours: i64) {
        let due = annotask::adapters::sqlite::format_datetime(&(Utc::now() - Duration::hours(hours)));
        sqlx::query("UPDATE assignments SET due_at = ? WHERE project_id = ? AND status IN ('assigned', 'in_progress')")
            .bind(due)
            .bind(project.id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

/// Create a temporary test database path.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    (dir, db_path)
}

/// Initializes a tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
