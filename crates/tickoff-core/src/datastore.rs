//! Persistence collaborators for the task store.
//!
//! A backend owns durable storage for the task collection and the theme flag.
//! The store awaits every call before it touches its own cache, so a backend
//! only has to report success or failure honestly.

mod file;
mod memory;

use chrono::{DateTime, Utc};

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::task::{Task, TaskId};

#[allow(async_fn_in_trait)]
pub trait TaskBackend {
    /// Every stored task, in storage order. An empty store yields an empty vector.
    async fn load_tasks(&self) -> anyhow::Result<Vec<Task>>;

    async fn append_task(&mut self, task: &Task) -> anyhow::Result<()>;

    /// Flips `completed` and stamps `updated_at`. `None` when the id is unknown.
    async fn toggle_completed(
        &mut self,
        id: TaskId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>>;

    /// `false` when the id is unknown.
    async fn remove_task(&mut self, id: TaskId) -> anyhow::Result<bool>;

    /// `None` when no preference was ever stored.
    async fn load_theme(&self) -> anyhow::Result<Option<bool>>;

    /// Stores the preference and returns the value that actually landed.
    async fn save_theme(&mut self, dark_mode: bool) -> anyhow::Result<bool>;
}
