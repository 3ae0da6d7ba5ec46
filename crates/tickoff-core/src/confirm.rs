use tracing::{debug, info};

use crate::datastore::TaskBackend;
use crate::datetime::Clock;
use crate::store::{StoreResult, TaskStore};
use crate::task::{Task, TaskId};

/// Single-slot confirmation for deletes. A newer request replaces the
/// pending one; nothing queues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeleteConfirmation {
    #[default]
    Idle,
    Pending(Task),
}

impl DeleteConfirmation {
    pub fn pending(&self) -> Option<&Task> {
        match self {
            Self::Idle => None,
            Self::Pending(task) => Some(task),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Arms the machine for `task`. No store call happens here.
    pub fn request(&mut self, task: Task) {
        if let Self::Pending(previous) = self {
            debug!(replaced = %previous.id, with = %task.id, "pending delete replaced");
        }
        *self = Self::Pending(task);
    }

    /// Back to idle without touching the store. Returns the dropped target.
    pub fn cancel(&mut self) -> Option<Task> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Pending(task) => {
                debug!(id = %task.id, "delete cancelled");
                Some(task)
            }
        }
    }

    /// Deletes the pending task and refreshes the store's snapshot.
    ///
    /// The machine is idle afterwards whether or not the store call
    /// succeeded. Returns the id that was deleted, or `None` when nothing was
    /// pending.
    #[tracing::instrument(skip_all)]
    pub async fn confirm<B, C>(
        &mut self,
        store: &mut TaskStore<B, C>,
    ) -> StoreResult<Option<TaskId>>
    where
        B: TaskBackend,
        C: Clock,
    {
        let Self::Pending(task) = std::mem::take(self) else {
            debug!("confirm with nothing pending");
            return Ok(None);
        };

        store.delete_task(task.id).await?;
        store.list_tasks().await?;

        info!(id = %task.id, "delete confirmed");
        Ok(Some(task.id))
    }
}

#[cfg(test)]
mod tests {
    use super::DeleteConfirmation;
    use crate::datastore::MemoryBackend;
    use crate::datetime::FixedClock;
    use crate::store::TaskStore;
    use crate::store::tests::{FlakyBackend, t0};

    #[tokio::test]
    async fn last_request_wins_and_only_it_is_deleted() {
        let mut store =
            TaskStore::with_clock(MemoryBackend::new(), FixedClock::new(t0()), chrono_tz::UTC);
        let x = store.add_task("X", None, None).await.expect("add");
        let y = store.add_task("Y", None, None).await.expect("add");

        let mut confirmation = DeleteConfirmation::default();
        confirmation.request(x.clone());
        confirmation.request(y.clone());
        assert_eq!(confirmation.pending(), Some(&y));

        let deleted = confirmation.confirm(&mut store).await.expect("confirm");
        assert_eq!(deleted, Some(y.id));
        assert!(confirmation.is_idle());

        let remaining: Vec<_> = store.cached_tasks().iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![x.id]);
    }

    #[tokio::test]
    async fn cancel_never_calls_the_store() {
        let mut store = TaskStore::with_clock(
            FlakyBackend::default(),
            FixedClock::new(t0()),
            chrono_tz::UTC,
        );
        let task = store.add_task("Keep", None, None).await.expect("add");
        store.backend_mut().fail_writes = true;

        let mut confirmation = DeleteConfirmation::default();
        confirmation.request(task.clone());
        assert_eq!(confirmation.cancel(), Some(task));
        assert!(confirmation.is_idle());
        assert_eq!(confirmation.cancel(), None);

        store.backend_mut().fail_writes = false;
        assert_eq!(store.list_tasks().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn confirm_while_idle_is_a_no_op() {
        let mut store =
            TaskStore::with_clock(MemoryBackend::new(), FixedClock::new(t0()), chrono_tz::UTC);
        store.add_task("Untouched", None, None).await.expect("add");

        let mut confirmation = DeleteConfirmation::Idle;
        assert_eq!(confirmation.confirm(&mut store).await.expect("confirm"), None);
        assert_eq!(store.list_tasks().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_surfaces_and_leaves_machine_idle() {
        let mut store = TaskStore::with_clock(
            FlakyBackend::default(),
            FixedClock::new(t0()),
            chrono_tz::UTC,
        );
        let task = store.add_task("Stubborn", None, None).await.expect("add");
        store.backend_mut().fail_writes = true;

        let mut confirmation = DeleteConfirmation::default();
        confirmation.request(task);
        let err = confirmation.confirm(&mut store).await.expect_err("must fail");
        assert!(err.is_storage());
        assert!(confirmation.is_idle());
        assert_eq!(store.cached_tasks().len(), 1);
    }

    #[tokio::test]
    async fn confirming_an_already_deleted_task_is_harmless() {
        let mut store =
            TaskStore::with_clock(MemoryBackend::new(), FixedClock::new(t0()), chrono_tz::UTC);
        let task = store.add_task("Twice", None, None).await.expect("add");

        let mut first = DeleteConfirmation::default();
        let mut second = DeleteConfirmation::default();
        first.request(task.clone());
        second.request(task.clone());

        first.confirm(&mut store).await.expect("first confirm");
        second.confirm(&mut store).await.expect("second confirm is a no-op");
        assert!(store.cached_tasks().is_empty());
    }
}
