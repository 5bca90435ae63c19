//! Adaptive assignment engine.
//!
//! Decides how many distinct workers each task of a project needs and
//! creates the missing assignment rows.
//!
//! One pass over a project:
//! 1. Load the active pool. An empty pool ends the pass with `no_annotators`.
//! 2. Derive the overlap target from the pool size.
//! 3. For every task below the target, rank candidates and insert rows until
//!    the task reaches the target or candidates run out.
//!
//! Ranking, for each task:
//! - only approved members with spare capacity who hold no row for the task;
//! - a tagged task admits only workers with a verified grant for the tag;
//! - lowest open load first, then earliest pool join, then worker id.
//!
//! Loads are tracked in memory during the pass, so the rows of a single
//! pass spread across the pool.
//!
//! Every write to a project happens inside a [`ProjectScope`]: the
//! in-process guard from [`ProjectLocks`] plus a lease row in the database,
//! so passes started by separate processes against one file also take turns.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    overlap_for_pool_size, Assignment, AssignmentResult, AssignmentStatusKind, InsertOutcome,
    OverlapResult, PoolMember,
};
use crate::domain::ports::{AssignmentStore, CapacityPolicy, UnboundedCapacity};
use crate::services::project_locks::ProjectLocks;

/// Default time a worker has before an assignment expires.
pub const DEFAULT_ASSIGNMENT_TIMEOUT_HOURS: i64 = 24;

/// Lease lifetime; a crashed holder blocks the project at most this long.
pub const DEFAULT_LEASE_TTL_SECS: i64 = 120;

/// How long to wait for another process's lease before giving up.
pub const DEFAULT_LEASE_WAIT_SECS: u64 = 30;

const LEASE_RETRY: std::time::Duration = std::time::Duration::from_millis(25);

/// Exclusive write access to one project. Hand it back through
/// [`AssignmentEngine::leave_project`].
pub struct ProjectScope {
    project_id: Uuid,
    holder: Uuid,
    _guard: OwnedMutexGuard<()>,
}

pub struct AssignmentEngine<S: AssignmentStore> {
    store: Arc<S>,
    capacity: Arc<dyn CapacityPolicy>,
    locks: ProjectLocks,
    assignment_timeout: Duration,
    lease_ttl: Duration,
    lease_wait: std::time::Duration,
}

impl<S: AssignmentStore> AssignmentEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            capacity: Arc::new(UnboundedCapacity),
            locks: ProjectLocks::new(),
            assignment_timeout: Duration::hours(DEFAULT_ASSIGNMENT_TIMEOUT_HOURS),
            lease_ttl: Duration::seconds(DEFAULT_LEASE_TTL_SECS),
            lease_wait: std::time::Duration::from_secs(DEFAULT_LEASE_WAIT_SECS),
        }
    }

    pub fn with_capacity_policy(mut self, capacity: Arc<dyn CapacityPolicy>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Share serialization scopes with other components.
    pub fn with_locks(mut self, locks: ProjectLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_assignment_timeout(mut self, timeout: Duration) -> Self {
        self.assignment_timeout = timeout;
        self
    }

    pub fn with_lease_wait(mut self, wait: std::time::Duration) -> Self {
        self.lease_wait = wait;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Overlap target and pool counts for a project. Read-only.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn calculate_optimal_overlap(&self, project_id: Uuid) -> DomainResult<OverlapResult> {
        let members = self.store.active_pool_members(project_id).await?;
        let loads = self.store.pool_open_loads(project_id).await?;
        Ok(self.overlap_for(&members, &loads))
    }

    /// Top up every under-covered task of a project.
    ///
    /// Holds the project's scope for the whole pass. Never touches
    /// existing rows.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn adaptive_assign_project_tasks(&self, project_id: Uuid) -> DomainResult<AssignmentResult> {
        let scope = self.enter_project(project_id).await?;
        let result = self.assign_locked(project_id, Utc::now()).await;
        self.leave_project(scope).await;
        result
    }

    /// Take the in-process guard, then the database lease.
    ///
    /// Fails with [`DomainError::ProjectBusy`] when another holder keeps
    /// the lease past the configured wait.
    pub async fn enter_project(&self, project_id: Uuid) -> DomainResult<ProjectScope> {
        let guard = self.locks.lock(project_id).await;
        let holder = Uuid::new_v4();
        let deadline = tokio::time::Instant::now() + self.lease_wait;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self
                .store
                .try_acquire_project_lease(project_id, holder, self.lease_ttl, Utc::now())
                .await?
            {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(project_id = %project_id, attempts, "project lease held elsewhere");
                return Err(DomainError::ProjectBusy(project_id));
            }
            tokio::time::sleep(LEASE_RETRY).await;
        }
        if attempts > 1 {
            tracing::debug!(project_id = %project_id, attempts, "project lease acquired after waiting");
        }
        Ok(ProjectScope {
            project_id,
            holder,
            _guard: guard,
        })
    }

    /// Release the lease. A failed release only delays other holders until
    /// the lease expires.
    pub async fn leave_project(&self, scope: ProjectScope) {
        if let Err(e) = self.store.release_project_lease(scope.project_id, scope.holder).await {
            tracing::warn!(project_id = %scope.project_id, error = %e, "failed to release project lease");
        }
    }

    /// Slots still open on one task, from a fresh coverage read.
    async fn remaining_shortfall(&self, project_id: Uuid, task_id: Uuid, overlap: u32) -> DomainResult<u32> {
        let deficient = self.store.deficient_tasks(project_id, overlap).await?;
        Ok(deficient
            .iter()
            .find(|c| c.task.id == task_id)
            .map_or(0, |c| c.shortfall(overlap)))
    }

    fn overlap_for(&self, members: &[PoolMember], loads: &HashMap<Uuid, u32>) -> OverlapResult {
        let total_workers = u32::try_from(members.len()).unwrap_or(u32::MAX);
        let eligible_workers = members
            .iter()
            .filter(|m| {
                m.worker.is_assignable()
                    && self
                        .capacity
                        .has_capacity(&m.worker, loads.get(&m.worker.id).copied().unwrap_or(0))
            })
            .count();

        OverlapResult {
            overlap: overlap_for_pool_size(total_workers),
            total_workers,
            eligible_workers: u32::try_from(eligible_workers).unwrap_or(u32::MAX),
        }
    }

    async fn assign_locked(&self, project_id: Uuid, now: DateTime<Utc>) -> DomainResult<AssignmentResult> {
        let members = self.store.active_pool_members(project_id).await?;
        if members.is_empty() {
            tracing::info!(project_id = %project_id, "no active pool members, nothing to assign");
            return Ok(AssignmentResult::no_annotators());
        }

        let mut loads = self.store.pool_open_loads(project_id).await?;
        let verified = self.store.pool_verified_tags(project_id).await?;
        let stats = self.overlap_for(&members, &loads);
        let deficient = self.store.deficient_tasks(project_id, stats.overlap).await?;

        let approved: Vec<&PoolMember> = members.iter().filter(|m| m.worker.is_assignable()).collect();
        let no_tags = HashSet::new();

        let mut created_count = 0u32;
        let mut conflicts = 0u32;
        let mut no_eligible_tasks = 0u32;
        let mut short_tasks = 0u32;

        for coverage in &deficient {
            let task = &coverage.task;
            let qualified: Vec<&PoolMember> = approved
                .iter()
                .copied()
                .filter(|m| match &task.required_tag {
                    Some(tag) => verified.get(&m.worker.id).unwrap_or(&no_tags).contains(tag),
                    None => true,
                })
                .collect();

            if qualified.is_empty() && task.required_tag.is_some() {
                tracing::debug!(
                    task_id = %task.id,
                    required_tag = task.required_tag.as_deref().unwrap_or_default(),
                    "no worker holds a verified grant for the task's tag"
                );
                no_eligible_tasks += 1;
                continue;
            }

            let mut candidates: Vec<&PoolMember> = qualified
                .into_iter()
                .filter(|m| !coverage.assigned_workers.contains(&m.worker.id))
                .collect();
            candidates.sort_by(|a, b| rank(a, b, &loads));

            let mut needed = coverage.shortfall(stats.overlap);
            for member in candidates {
                if needed == 0 {
                    break;
                }
                let load = loads.get(&member.worker.id).copied().unwrap_or(0);
                if !self.capacity.has_capacity(&member.worker, load) {
                    continue;
                }

                let assignment = Assignment::new(project_id, task.id, member.worker.id, now, self.assignment_timeout);
                match self.store.insert_assignment(&assignment).await? {
                    InsertOutcome::Created => {
                        tracing::debug!(
                            task_id = %task.id,
                            worker_id = %member.worker.id,
                            load = load + 1,
                            "assignment created"
                        );
                        *loads.entry(member.worker.id).or_insert(0) += 1;
                        created_count += 1;
                        needed -= 1;
                    }
                    InsertOutcome::Conflict => {
                        // Someone else wrote to the task; its snapshot is stale.
                        conflicts += 1;
                        needed = self.remaining_shortfall(project_id, task.id, stats.overlap).await?;
                        tracing::debug!(
                            task_id = %task.id,
                            worker_id = %member.worker.id,
                            needed,
                            "assignment already present, coverage re-read"
                        );
                    }
                }
            }

            if needed > 0 {
                short_tasks += 1;
            }
        }

        let deficient_tasks = u32::try_from(deficient.len()).unwrap_or(u32::MAX);
        let (status, message) = if created_count > 0 {
            (
                AssignmentStatusKind::Assigned,
                format!(
                    "Created {created_count} assignments across {deficient_tasks} under-covered tasks (overlap {})",
                    stats.overlap
                ),
            )
        } else if no_eligible_tasks > 0 {
            (
                AssignmentStatusKind::NoEligible,
                format!("{no_eligible_tasks} tasks require expertise no pool member has verified"),
            )
        } else {
            (
                AssignmentStatusKind::AlreadySatisfied,
                format!("All tasks already meet overlap {} or have no remaining candidates", stats.overlap),
            )
        };

        tracing::info!(
            project_id = %project_id,
            status = status.as_str(),
            created = created_count,
            overlap = stats.overlap,
            total_workers = stats.total_workers,
            eligible_workers = stats.eligible_workers,
            deficient_tasks,
            short_tasks,
            no_eligible_tasks,
            conflicts,
            "assignment pass finished"
        );

        Ok(AssignmentResult {
            status,
            message,
            created_count,
            overlap: stats.overlap,
            total_workers: stats.total_workers,
            eligible_workers: stats.eligible_workers,
            deficient_tasks,
            no_eligible_tasks,
            conflicts,
        })
    }
}

/// Candidate order: lowest open load, earliest join, then worker id.
fn rank(a: &PoolMember, b: &PoolMember, loads: &HashMap<Uuid, u32>) -> Ordering {
    let load_a = loads.get(&a.worker.id).copied().unwrap_or(0);
    let load_b = loads.get(&b.worker.id).copied().unwrap_or(0);
    load_a
        .cmp(&load_b)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.worker.id.cmp(&b.worker.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAssignmentStore, SqliteDirectoryStore};
    use crate::domain::models::{
        ApprovalStatus, AssignmentFilter, AssignmentStatus, ExpertiseGrant, ExpertiseTag, PoolMembership,
        Project, Task, Worker,
    };
    use crate::domain::ports::{DirectoryStore, FixedCapacity};

    struct Fixture {
        engine: AssignmentEngine<SqliteAssignmentStore>,
        directory: SqliteDirectoryStore,
        project: Project,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let directory = SqliteDirectoryStore::new(pool.clone());
        let project = Project::new("Toxicity");
        directory.upsert_project(&project).await.unwrap();
        Fixture {
            engine: AssignmentEngine::new(Arc::new(SqliteAssignmentStore::new(pool))),
            directory,
            project,
        }
    }

    async fn join(f: &Fixture, email: &str, status: ApprovalStatus, minutes_ago: i64) -> Worker {
        let worker = Worker::new(email, status);
        f.directory.upsert_worker(&worker).await.unwrap();
        let membership = PoolMembership::new(f.project.id, worker.id)
            .joined_at(Utc::now() - Duration::minutes(minutes_ago));
        f.directory.upsert_membership(&membership).await.unwrap();
        worker
    }

    async fn tasks(f: &Fixture, n: usize) -> Vec<Task> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let task = Task::new(f.project.id);
            f.directory.insert_task(&task).await.unwrap();
            out.push(task);
        }
        out
    }

    async fn rows(f: &Fixture) -> Vec<Assignment> {
        f.engine
            .store()
            .list_assignments(AssignmentFilter {
                project_id: Some(f.project.id),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_overlap_counts_pending_members_but_not_as_eligible() {
        let f = setup().await;
        join(&f, "a@example.com", ApprovalStatus::Approved, 30).await;
        join(&f, "b@example.com", ApprovalStatus::Pending, 20).await;

        let result = f.engine.calculate_optimal_overlap(f.project.id).await.unwrap();
        assert_eq!(result.total_workers, 2);
        assert_eq!(result.eligible_workers, 1);
        assert_eq!(result.overlap, 2);
    }

    #[tokio::test]
    async fn test_pass_spreads_load_and_sets_due_at() {
        let f = setup().await;
        let a = join(&f, "a@example.com", ApprovalStatus::Approved, 30).await;
        let b = join(&f, "b@example.com", ApprovalStatus::Approved, 20).await;
        let c = join(&f, "c@example.com", ApprovalStatus::Approved, 10).await;
        let d = join(&f, "d@example.com", ApprovalStatus::Approved, 5).await;
        tasks(&f, 4).await;

        let result = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.status, AssignmentStatusKind::Assigned);
        assert_eq!(result.created_count, 12);

        let rows = rows(&f).await;
        for worker in [&a, &b, &c, &d] {
            let n = rows.iter().filter(|r| r.worker_id == worker.id).count();
            assert_eq!(n, 3, "uneven load for {}", worker.email);
        }
        for row in &rows {
            assert_eq!(row.status, AssignmentStatus::Assigned);
            assert_eq!(row.due_at - row.assigned_at, Duration::hours(24));
        }
    }

    #[tokio::test]
    async fn test_tagged_task_without_qualified_worker_is_no_eligible() {
        let f = setup().await;
        let a = join(&f, "a@example.com", ApprovalStatus::Approved, 30).await;
        f.directory.upsert_tag(&ExpertiseTag::new("medical", "Medical")).await.unwrap();
        f.directory.upsert_grant(&ExpertiseGrant::pending(a.id, "medical")).await.unwrap();
        let task = Task::new(f.project.id).requiring("medical");
        f.directory.insert_task(&task).await.unwrap();

        let result = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.status, AssignmentStatusKind::NoEligible);
        assert_eq!(result.no_eligible_tasks, 1);
        assert!(rows(&f).await.is_empty());

        f.directory.upsert_grant(&ExpertiseGrant::verified(a.id, "medical")).await.unwrap();
        let result = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.status, AssignmentStatusKind::Assigned);
        assert_eq!(result.created_count, 1);
    }

    #[tokio::test]
    async fn test_tag_filter_picks_only_verified_workers() {
        let f = setup().await;
        let expert = join(&f, "expert@example.com", ApprovalStatus::Approved, 5).await;
        join(&f, "b@example.com", ApprovalStatus::Approved, 30).await;
        join(&f, "c@example.com", ApprovalStatus::Approved, 20).await;
        f.directory.upsert_tag(&ExpertiseTag::new("legal", "Legal")).await.unwrap();
        f.directory.upsert_grant(&ExpertiseGrant::verified(expert.id, "legal")).await.unwrap();
        let task = Task::new(f.project.id).requiring("legal");
        f.directory.insert_task(&task).await.unwrap();

        let result = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.status, AssignmentStatusKind::Assigned);
        assert_eq!(result.created_count, 1);
        assert_eq!(rows(&f).await[0].worker_id, expert.id);

        let again = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(again.status, AssignmentStatusKind::AlreadySatisfied);
        assert_eq!(again.created_count, 0);
    }

    #[tokio::test]
    async fn test_earliest_joiner_wins_ties() {
        let f = setup().await;
        let late = join(&f, "late@example.com", ApprovalStatus::Approved, 1).await;
        let early = join(&f, "early@example.com", ApprovalStatus::Approved, 60).await;
        join(&f, "mid@example.com", ApprovalStatus::Suspended, 30).await;
        tasks(&f, 1).await;

        // Pool of 3 means overlap 3, but only two members are approved.
        let result = f.engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.overlap, 3);
        assert_eq!(result.created_count, 2);

        let rows = rows(&f).await;
        let workers: HashSet<Uuid> = rows.iter().map(|r| r.worker_id).collect();
        assert!(workers.contains(&late.id) && workers.contains(&early.id));
    }

    #[tokio::test]
    async fn test_fixed_capacity_caps_open_load() {
        let f = setup().await;
        let pool_store = f.engine.store().clone();
        let engine = AssignmentEngine::new(pool_store).with_capacity_policy(Arc::new(FixedCapacity::new(2)));
        join(&f, "a@example.com", ApprovalStatus::Approved, 10).await;
        tasks(&f, 5).await;

        let result = engine.adaptive_assign_project_tasks(f.project.id).await.unwrap();
        assert_eq!(result.created_count, 2);

        let overlap = engine.calculate_optimal_overlap(f.project.id).await.unwrap();
        assert_eq!(overlap.eligible_workers, 0);
    }

    #[test]
    fn test_rank_orders_by_load_then_join_time() {
        let now = Utc::now();
        let a = PoolMember {
            worker: Worker::new("a@example.com", ApprovalStatus::Approved),
            joined_at: now,
        };
        let b = PoolMember {
            worker: Worker::new("b@example.com", ApprovalStatus::Approved),
            joined_at: now - Duration::hours(1),
        };
        let mut loads = HashMap::new();
        assert_eq!(rank(&a, &b, &loads), Ordering::Greater);

        loads.insert(b.worker.id, 1);
        assert_eq!(rank(&a, &b, &loads), Ordering::Less);
    }
}
