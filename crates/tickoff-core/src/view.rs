use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Days, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::datetime::local_date;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Week,
    Overdue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    Priority,
}

/// The three independent selections that shape the displayed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub status: StatusFilter,
    pub due: DateFilter,
    pub sort: SortKey,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

impl DateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Week => "week",
            Self::Overdue => "overdue",
        }
    }

    /// A task without a deadline only passes `All`.
    pub fn matches(self, task: &Task, now: DateTime<Utc>, tz: &Tz) -> bool {
        if self == Self::All {
            return true;
        }
        let Some(due) = task.due else {
            return false;
        };

        match self {
            Self::All => true,
            Self::Today => local_date(due, tz) == local_date(now, tz),
            Self::Week => {
                let horizon = now.checked_add_days(Days::new(7)).unwrap_or(DateTime::<Utc>::MAX_UTC);
                now <= due && due <= horizon
            }
            Self::Overdue => due < now && !task.completed,
        }
    }
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateDesc => "date_desc",
            Self::DateAsc => "date_asc",
            Self::Priority => "priority",
        }
    }

    /// Stable in every mode: ties keep their incoming order.
    pub fn apply(self, tasks: &mut [Task]) {
        match self {
            Self::DateDesc => tasks.sort_by_key(|task| Reverse(created_key(task))),
            Self::DateAsc => tasks.sort_by_key(created_key),
            Self::Priority => tasks.sort_by_key(|task| Reverse(task.priority_rank())),
        }
    }
}

fn created_key(task: &Task) -> DateTime<Utc> {
    task.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

macro_rules! keyed_enum {
    ($ty:ident, $label:literal, [$($variant:ident),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                $(
                    if wanted == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                let accepted = [$($ty::$variant.as_str()),+].join("|");
                Err(anyhow!("unknown {} `{s}`; expected {accepted}", $label))
            }
        }
    };
}

keyed_enum!(StatusFilter, "status filter", [All, Active, Completed]);
keyed_enum!(DateFilter, "date filter", [All, Today, Week, Overdue]);
keyed_enum!(SortKey, "sort key", [DateDesc, DateAsc, Priority]);

/// Derives the displayed sequence: status filter, then date filter, then sort.
/// Pure: works on a copy and never touches `tasks`.
#[tracing::instrument(skip(tasks, now, tz), fields(total = tasks.len()))]
pub fn visible_tasks(
    tasks: &[Task],
    query: &ViewQuery,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Task> {
    let mut list: Vec<Task> = tasks
        .iter()
        .filter(|task| query.status.matches(task))
        .filter(|task| query.due.matches(task, now, tz))
        .cloned()
        .collect();

    query.sort.apply(&mut list);

    trace!(visible = list.len(), "derived visible tasks");
    list
}
