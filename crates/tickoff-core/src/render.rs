use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::board::BoardCounts;
use crate::config::Config;
use crate::datetime::format_local_datetime;
use crate::task::{Priority, Task};
use crate::theme::Theme;
use crate::view::ViewQuery;

/// ANSI codes per theme. Dark terminals get the bright variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    id: &'static str,
    overdue: &'static str,
    done: &'static str,
    high: &'static str,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                id: "33",
                overdue: "31",
                done: "32",
                high: "35",
            },
            Theme::Dark => Self {
                id: "93",
                overdue: "91",
                done: "92",
                high: "95",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color,
            palette: Palette::for_theme(theme),
        })
    }

    /// Repaints with the other palette after a theme change.
    pub fn set_theme(&mut self, theme: Theme) {
        self.palette = Palette::for_theme(theme);
    }

    #[tracing::instrument(skip(self, tasks, now, tz), fields(rows = tasks.len()))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            " ".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Task".to_string(),
        ];
        let rows = self.task_rows(tasks, now, tz);

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_summary(
        &mut self,
        counts: BoardCounts,
        query: ViewQuery,
        shown: usize,
        theme: Theme,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(
            out,
            "{shown} shown of {} ({} active, {} done, {} overdue)",
            counts.total, counts.active, counts.completed, counts.overdue
        )?;
        writeln!(
            out,
            "status={} due={} sort={} theme={theme}",
            query.status, query.due, query.sort
        )?;
        Ok(())
    }

    pub fn print_task_line(&mut self, prefix: &str, task: &Task, tz: &Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let due = task
            .due
            .map(|due| format!(" (due {})", format_local_datetime(due, tz)))
            .unwrap_or_default();
        writeln!(
            out,
            "{prefix} {} {}{due}",
            self.paint(&task.short_id(), self.palette.id),
            task.text
        )?;
        Ok(())
    }

    pub fn print_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "theme: {theme} ({})", theme.toggle_label())?;
        Ok(())
    }

    fn task_rows(&self, tasks: &[Task], now: DateTime<Utc>, tz: &Tz) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(&task.short_id(), self.palette.id);

            let mark = if task.completed {
                self.paint("✓", self.palette.done)
            } else {
                "○".to_string()
            };

            let priority = match task.priority {
                Some(Priority::High) => self.paint("high", self.palette.high),
                Some(other) => other.as_str().to_string(),
                None => String::new(),
            };

            let due = task
                .due
                .map(|due| format_local_datetime(due, tz))
                .unwrap_or_default();
            let due = if task.is_overdue(now) {
                self.paint(&due, self.palette.overdue)
            } else {
                due
            };

            rows.push(vec![id, mark, priority, due, task.text.clone()]);
        }

        rows
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Question shown before a delete is carried out.
pub fn delete_prompt(task: &Task) -> String {
    format!("Delete task \"{}\"? [y/N] ", task.text)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);

    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            write!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }
    writeln!(writer)?;

    for (idx, width) in widths.iter().enumerate() {
        let sep = if idx == last { "" } else { " " };
        write!(writer, "{:-<width$}{sep}", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                write!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
