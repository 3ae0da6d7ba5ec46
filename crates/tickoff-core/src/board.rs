//! View-model for one user session.
//!
//! # Responsibility
//! - Hold the UI selections, the delete confirmation and the displayed theme
//!   as plain fields instead of ambient globals.
//! - Route every user intent through the store and re-fetch afterwards.
//!
//! # Invariants
//! - The displayed list is always recomputed from the store's snapshot; the
//!   board never keeps a second copy of the collection.
//! - A mutation counts as finished only after the follow-up refresh.

use tracing::debug;

use crate::confirm::DeleteConfirmation;
use crate::datastore::TaskBackend;
use crate::datetime::{Clock, SystemClock};
use crate::store::{StoreResult, TaskStore};
use crate::task::{Task, TaskId};
use crate::theme::{Theme, ThemeToggle};
use crate::view::{DateFilter, SortKey, StatusFilter, ViewQuery, visible_tasks};

/// Header numbers shown above the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub overdue: usize,
}

#[derive(Debug)]
pub struct Board<B, C = SystemClock> {
    store: TaskStore<B, C>,
    query: ViewQuery,
    confirmation: DeleteConfirmation,
    theme: ThemeToggle,
}

impl<B: TaskBackend, C: Clock> Board<B, C> {
    /// Loads the collection and the saved theme.
    #[tracing::instrument(skip(store))]
    pub async fn open(mut store: TaskStore<B, C>, query: ViewQuery) -> StoreResult<Self> {
        store.list_tasks().await?;
        let theme = ThemeToggle::load(&mut store).await?;
        Ok(Self {
            store,
            query,
            confirmation: DeleteConfirmation::default(),
            theme,
        })
    }

    pub fn store(&self) -> &TaskStore<B, C> {
        &self.store
    }

    pub fn into_store(self) -> TaskStore<B, C> {
        self.store
    }

    /// Raw snapshot in store order.
    pub fn tasks(&self) -> &[Task] {
        self.store.cached_tasks()
    }

    pub fn query(&self) -> ViewQuery {
        self.query
    }

    pub fn set_query(&mut self, query: ViewQuery) {
        self.query = query;
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.query.status = status;
    }

    pub fn set_date_filter(&mut self, due: DateFilter) {
        self.query.due = due;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.query.sort = sort;
    }

    /// The displayed sequence. Cheap enough to call on every render, and
    /// works from the last snapshot even when the backend is unreachable.
    pub fn visible(&self) -> Vec<Task> {
        visible_tasks(
            self.store.cached_tasks(),
            &self.query,
            self.store.now(),
            self.store.timezone(),
        )
    }

    pub fn counts(&self) -> BoardCounts {
        let now = self.store.now();
        self.tasks()
            .iter()
            .fold(BoardCounts::default(), |mut counts, task| {
                counts.total += 1;
                if task.completed {
                    counts.completed += 1;
                } else {
                    counts.active += 1;
                }
                if task.is_overdue(now) {
                    counts.overdue += 1;
                }
                counts
            })
    }

    pub async fn refresh(&mut self) -> StoreResult<()> {
        self.store.list_tasks().await?;
        Ok(())
    }

    pub async fn add_task(
        &mut self,
        text: &str,
        due: Option<&str>,
        priority: Option<&str>,
    ) -> StoreResult<Task> {
        let task = self.store.add_task(text, due, priority).await?;
        self.refresh().await?;
        Ok(task)
    }

    pub async fn toggle_task(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        let updated = self.store.toggle_task(id).await?;
        self.refresh().await?;
        Ok(updated)
    }

    /// Arms the confirmation for a task in the current snapshot. Unknown ids
    /// leave the machine untouched and return `false`.
    pub fn request_delete(&mut self, id: TaskId) -> bool {
        match self.store.task(id) {
            Ok(task) => {
                self.confirmation.request(task.clone());
                true
            }
            Err(err) => {
                debug!(error = %err, "delete requested for a task not on the board");
                false
            }
        }
    }

    pub fn pending_delete(&self) -> Option<&Task> {
        self.confirmation.pending()
    }

    pub fn cancel_delete(&mut self) -> Option<Task> {
        self.confirmation.cancel()
    }

    pub async fn confirm_delete(&mut self) -> StoreResult<Option<TaskId>> {
        self.confirmation.confirm(&mut self.store).await
    }

    pub fn theme(&self) -> Theme {
        self.theme.theme()
    }

    pub fn dark_mode(&self) -> bool {
        self.theme.is_dark()
    }

    pub async fn toggle_theme(&mut self) -> StoreResult<Theme> {
        self.theme.toggle(&mut self.store).await?;
        Ok(self.theme.theme())
    }

    pub async fn set_theme(&mut self, theme: Theme) -> StoreResult<Theme> {
        self.theme.set(&mut self.store, theme == Theme::Dark).await?;
        Ok(self.theme.theme())
    }
}
