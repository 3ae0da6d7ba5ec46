//! Authoritative task collection and theme flag.
//!
//! Every mutation goes to the backend first; the cached snapshot is only
//! patched once the backend reported success, so a failed write never leaves
//! the cache ahead of durable state.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::datastore::TaskBackend;
use crate::datetime::{Clock, SystemClock, parse_due_date, project_timezone};
use crate::task::{Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task text cannot be empty")]
    EmptyText,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("storage failure during {op}")]
    Storage {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    fn storage(op: &'static str, source: anyhow::Error) -> Self {
        warn!(op, error = %format!("{source:#}"), "backend call failed");
        Self::Storage { op, source }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub struct TaskStore<B, C = SystemClock> {
    backend: B,
    clock: C,
    tz: Tz,
    tasks: Vec<Task>,
    dark_mode: Option<bool>,
    last_created_at: Option<DateTime<Utc>>,
}

impl<B: TaskBackend> TaskStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, SystemClock, *project_timezone())
    }
}

impl<B: TaskBackend, C: Clock> TaskStore<B, C> {
    pub fn with_clock(backend: B, clock: C, tz: Tz) -> Self {
        Self {
            backend,
            clock,
            tz,
            tasks: Vec::new(),
            dark_mode: None,
            last_created_at: None,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// Last snapshot fetched from the backend, patched by successful writes.
    pub fn cached_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> StoreResult<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&mut self) -> StoreResult<Vec<Task>> {
        let tasks = self
            .backend
            .load_tasks()
            .await
            .map_err(|source| StoreError::storage("list_tasks", source))?;

        let newest = tasks.iter().filter_map(|task| task.created_at).max();
        self.last_created_at = self.last_created_at.max(newest);
        self.tasks = tasks;

        debug!(count = self.tasks.len(), "refreshed task snapshot");
        Ok(self.tasks.clone())
    }

    /// Appends a new task. Blank text is rejected before the backend is
    /// touched; an unparseable deadline becomes "no deadline"; an unknown
    /// priority becomes medium.
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn add_task(
        &mut self,
        text: &str,
        due: Option<&str>,
        priority: Option<&str>,
    ) -> StoreResult<Task> {
        let text = text.trim();
        if text.is_empty() {
            warn!("rejected task with empty text");
            return Err(ValidationError::EmptyText.into());
        }

        let now = self.clock.now();
        let priority = priority
            .and_then(Priority::parse_lenient)
            .unwrap_or_default();
        let due = due.and_then(|raw| parse_due_date(raw, now, &self.tz));

        // created_at never runs backwards, even if the wall clock does.
        let created_at = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };

        let task = Task::new_active(text.to_string(), priority, due, created_at);
        self.backend
            .append_task(&task)
            .await
            .map_err(|source| StoreError::storage("add_task", source))?;

        self.last_created_at = Some(created_at);
        self.tasks.push(task.clone());

        info!(id = %task.id, %priority, has_due = task.due.is_some(), "added task");
        Ok(task)
    }

    /// Flips completion. An unknown id is a no-op and yields `None`.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn toggle_task(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        let now = self.clock.now();
        let updated = self
            .backend
            .toggle_completed(id, now)
            .await
            .map_err(|source| StoreError::storage("toggle_task", source))?;

        let Some(updated) = updated else {
            debug!("toggle target not found; nothing to do");
            return Ok(None);
        };

        if let Some(cached) = self.tasks.iter_mut().find(|task| task.id == id) {
            *cached = updated.clone();
        }

        info!(completed = updated.completed, "toggled task");
        Ok(Some(updated))
    }

    /// Removes a task for good. Returns `false` when the id was already gone.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn delete_task(&mut self, id: TaskId) -> StoreResult<bool> {
        let removed = self
            .backend
            .remove_task(id)
            .await
            .map_err(|source| StoreError::storage("delete_task", source))?;

        if !removed {
            debug!("delete target not found; nothing to do");
            return Ok(false);
        }

        self.tasks.retain(|task| task.id != id);
        info!("deleted task");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_theme_preference(&mut self) -> StoreResult<bool> {
        let stored = self
            .backend
            .load_theme()
            .await
            .map_err(|source| StoreError::storage("get_theme_preference", source))?;

        let dark_mode = stored.unwrap_or(false);
        self.dark_mode = Some(dark_mode);
        Ok(dark_mode)
    }

    /// Persists the preference and returns what the backend confirmed.
    #[tracing::instrument(skip(self))]
    pub async fn set_theme_preference(&mut self, dark_mode: bool) -> StoreResult<bool> {
        let confirmed = self
            .backend
            .save_theme(dark_mode)
            .await
            .map_err(|source| StoreError::storage("set_theme_preference", source))?;

        if confirmed != dark_mode {
            warn!(requested = dark_mode, confirmed, "backend normalized theme preference");
        }
        self.dark_mode = Some(confirmed);
        info!(dark_mode = confirmed, "saved theme preference");
        Ok(confirmed)
    }

    pub fn cached_theme(&self) -> Option<bool> {
        self.dark_mode
    }
}
