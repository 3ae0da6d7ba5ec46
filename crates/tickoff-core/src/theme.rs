use std::fmt;

use tracing::debug;

use crate::datastore::TaskBackend;
use crate::datetime::Clock;
use crate::store::{StoreResult, TaskStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode { Self::Dark } else { Self::Light }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Label for the control that switches away from this theme.
    pub fn toggle_label(self) -> &'static str {
        match self {
            Self::Light => "switch to dark",
            Self::Dark => "switch to light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayed theme. It only ever shows what the store confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeToggle {
    dark_mode: bool,
}

impl ThemeToggle {
    pub async fn load<B: TaskBackend, C: Clock>(store: &mut TaskStore<B, C>) -> StoreResult<Self> {
        let dark_mode = store.get_theme_preference().await?;
        Ok(Self { dark_mode })
    }

    pub fn is_dark(self) -> bool {
        self.dark_mode
    }

    pub fn theme(self) -> Theme {
        Theme::from_dark_mode(self.dark_mode)
    }

    /// Asks the store for the opposite of what is shown, then shows whatever
    /// the store answered. On failure the display stays as it was.
    #[tracing::instrument(skip_all, fields(shown = self.dark_mode))]
    pub async fn toggle<B: TaskBackend, C: Clock>(
        &mut self,
        store: &mut TaskStore<B, C>,
    ) -> StoreResult<bool> {
        self.set(store, !self.dark_mode).await
    }

    pub async fn set<B: TaskBackend, C: Clock>(
        &mut self,
        store: &mut TaskStore<B, C>,
        dark_mode: bool,
    ) -> StoreResult<bool> {
        let confirmed = store.set_theme_preference(dark_mode).await?;
        debug!(requested = dark_mode, confirmed, "theme display updated");
        self.dark_mode = confirmed;
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::{Theme, ThemeToggle};
    use crate::datastore::{MemoryBackend, TaskBackend};
    use crate::datetime::FixedClock;
    use crate::store::TaskStore;
    use crate::store::tests::{FlakyBackend, t0};
    use crate::task::{Task, TaskId};

    /// A backend that refuses to store dark mode.
    #[derive(Debug, Default)]
    struct LightOnlyBackend {
        inner: MemoryBackend,
    }

    impl TaskBackend for LightOnlyBackend {
        async fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
            self.inner.load_tasks().await
        }

        async fn append_task(&mut self, task: &Task) -> anyhow::Result<()> {
            self.inner.append_task(task).await
        }

        async fn toggle_completed(
            &mut self,
            id: TaskId,
            at: DateTime<Utc>,
        ) -> anyhow::Result<Option<Task>> {
            self.inner.toggle_completed(id, at).await
        }

        async fn remove_task(&mut self, id: TaskId) -> anyhow::Result<bool> {
            self.inner.remove_task(id).await
        }

        async fn load_theme(&self) -> anyhow::Result<Option<bool>> {
            self.inner.load_theme().await
        }

        async fn save_theme(&mut self, _dark_mode: bool) -> anyhow::Result<bool> {
            self.inner.save_theme(false).await
        }
    }

    #[tokio::test]
    async fn toggle_flips_and_persists() {
        let mut store =
            TaskStore::with_clock(MemoryBackend::new(), FixedClock::new(t0()), chrono_tz::UTC);
        let mut toggle = ThemeToggle::load(&mut store).await.expect("load");
        assert_eq!(toggle.theme(), Theme::Light);

        assert!(toggle.toggle(&mut store).await.expect("toggle"));
        assert_eq!(toggle.theme(), Theme::Dark);
        assert!(store.get_theme_preference().await.expect("get"));

        assert!(!toggle.toggle(&mut store).await.expect("toggle back"));
        assert!(!store.get_theme_preference().await.expect("get"));
    }

    #[tokio::test]
    async fn display_follows_store_not_local_inverse() {
        let mut store = TaskStore::with_clock(
            LightOnlyBackend::default(),
            FixedClock::new(t0()),
            chrono_tz::UTC,
        );
        let mut toggle = ThemeToggle::load(&mut store).await.expect("load");

        let shown = toggle.toggle(&mut store).await.expect("toggle");
        assert!(!shown);
        assert!(!toggle.is_dark());
    }

    #[tokio::test]
    async fn failed_write_keeps_current_display() {
        let mut store = TaskStore::with_clock(
            FlakyBackend::default(),
            FixedClock::new(t0()),
            chrono_tz::UTC,
        );
        let mut toggle = ThemeToggle::load(&mut store).await.expect("load");
        store.backend_mut().fail_writes = true;

        let err = toggle.toggle(&mut store).await.expect_err("must fail");
        assert!(err.is_storage());
        assert_eq!(toggle.theme(), Theme::Light);
    }

    #[test]
    fn labels_point_at_the_other_theme() {
        assert_eq!(Theme::Light.toggle_label(), "switch to dark");
        assert_eq!(Theme::from_dark_mode(true).to_string(), "dark");
    }
}
