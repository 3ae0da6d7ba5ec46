use anyhow::anyhow;
use chrono::{DateTime, Utc};

use super::TaskBackend;
use crate::task::{Task, TaskId};

/// Volatile backend for tests and embedders that bring their own persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tasks: Vec<Task>,
    dark_mode: Option<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            dark_mode: None,
        }
    }
}

impl TaskBackend for MemoryBackend {
    async fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    async fn append_task(&mut self, task: &Task) -> anyhow::Result<()> {
        if self.tasks.iter().any(|existing| existing.id == task.id) {
            return Err(anyhow!("task id already stored: {}", task.id));
        }
        self.tasks.push(task.clone());
        Ok(())
    }

    async fn toggle_completed(
        &mut self,
        id: TaskId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        Ok(self.tasks.iter_mut().find(|task| task.id == id).map(|task| {
            task.completed = !task.completed;
            task.updated_at = Some(at);
            task.clone()
        }))
    }

    async fn remove_task(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        Ok(self.tasks.len() != before)
    }

    async fn load_theme(&self) -> anyhow::Result<Option<bool>> {
        Ok(self.dark_mode)
    }

    async fn save_theme(&mut self, dark_mode: bool) -> anyhow::Result<bool> {
        self.dark_mode = Some(dark_mode);
        Ok(dark_mode)
    }
}
