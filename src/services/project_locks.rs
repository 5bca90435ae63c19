//! Per-project serialization scopes.
//!
//! Engine passes, reactor top-ups and sweep expiries on the same project
//! take the same guard. Different projects never contend.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry of exclusive guards keyed by project id.
///
/// Cloning is cheap and clones share the registry.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    slots: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `project_id`. Released on drop.
    pub async fn lock(&self, project_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(project_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Number of projects that have been locked at least once.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_project_is_exclusive() {
        let locks = ProjectLocks::new();
        let project = Uuid::new_v4();

        let guard = locks.lock(project).await;
        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.lock(project).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_projects_do_not_block() {
        let locks = ProjectLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4())).await;
        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }
}
