use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::datetime::compact_date_serde;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort rank: high sorts above medium, medium above low.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Accepts the spelled-out names plus the Taskwarrior-style `L`/`M`/`H`
    /// shorthands. Returns `None` for anything else.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Some(Self::Low),
            "m" | "med" | "medium" => Some(Self::Medium),
            "h" | "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s)
            .ok_or_else(|| anyhow!("unknown priority `{s}`; expected low|medium|high"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    pub text: String,

    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,

    #[serde(default, with = "compact_date_serde::option")]
    pub due: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, with = "compact_date_serde::option")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "compact_date_serde::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new_active(
        text: String,
        priority: Priority,
        due: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            priority: Some(priority),
            due,
            completed: false,
            created_at: Some(created_at),
            updated_at: Some(created_at),
        }
    }

    /// Missing or unrecognized priorities rank as low.
    pub fn priority_rank(&self) -> u8 {
        self.priority.map(Priority::rank).unwrap_or(1)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due.map(|due| due < now).unwrap_or(false)
    }

    /// First eight characters of the id, enough to address a task from the CLI.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

// Records written by other tools may carry priorities we do not know; keep
// the task and drop the value instead of failing the whole load.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Priority::parse_lenient))
}
