use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::TaskBackend;
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Settings {
    dark_mode: bool,
}

/// Durable backend: one JSON task per line in `tasks.data`, the theme flag in
/// `settings.data`. Every write replaces the file atomically.
#[derive(Debug)]
pub struct FileBackend {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub settings_path: PathBuf,
}

impl FileBackend {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let settings_path = data_dir.join("settings.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !settings_path.exists() {
            fs::write(&settings_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            settings = %settings_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            settings_path,
        })
    }

    fn read_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    fn write_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    fn read_settings(&self) -> anyhow::Result<Option<Settings>> {
        let mut entries: Vec<Settings> =
            load_jsonl(&self.settings_path).context("failed to load settings.data")?;
        Ok(entries.pop())
    }
}

impl TaskBackend for FileBackend {
    #[tracing::instrument(skip(self))]
    async fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        self.read_tasks()
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    async fn append_task(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut tasks = self.read_tasks()?;
        if tasks.iter().any(|existing| existing.id == task.id) {
            return Err(anyhow!("task id already stored: {}", task.id));
        }
        tasks.push(task.clone());
        self.write_tasks(&tasks)
    }

    #[tracing::instrument(skip(self, at), fields(id = %id))]
    async fn toggle_completed(
        &mut self,
        id: TaskId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.read_tasks()?;
        let updated = {
            let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
                return Ok(None);
            };
            task.completed = !task.completed;
            task.updated_at = Some(at);
            task.clone()
        };
        self.write_tasks(&tasks)?;
        Ok(Some(updated))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn remove_task(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let mut tasks = self.read_tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.write_tasks(&tasks)?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn load_theme(&self) -> anyhow::Result<Option<bool>> {
        Ok(self.read_settings()?.map(|settings| settings.dark_mode))
    }

    #[tracing::instrument(skip(self))]
    async fn save_theme(&mut self, dark_mode: bool) -> anyhow::Result<bool> {
        save_jsonl_atomic(&self.settings_path, &[Settings { dark_mode }])
            .context("failed to save settings.data")?;
        // Report what is on disk, not what we meant to write.
        self.read_settings()?
            .map(|settings| settings.dark_mode)
            .ok_or_else(|| anyhow!("settings.data empty after write"))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
