use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::view::{DateFilter, SortKey, StatusFilter};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tickoff",
    version,
    about = "tickoff: a personal task list with priorities and deadlines",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "rc", global = true)]
    pub rc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show tasks, filtered and sorted.
    List(ListArgs),

    /// Create a task.
    Add(AddArgs),

    /// Toggle a task between active and completed.
    Done {
        /// Task id or a unique prefix of it.
        id: String,
    },

    /// Delete a task after confirmation.
    Delete {
        /// Task id or a unique prefix of it.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Show or change the light/dark preference.
    Theme {
        #[arg(value_enum, default_value_t = ThemeAction::Show)]
        action: ThemeAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(
        long = "status",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<StatusFilter>())
    )]
    pub status: Option<StatusFilter>,

    #[arg(
        long = "due",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<DateFilter>())
    )]
    pub due: Option<DateFilter>,

    #[arg(
        long = "sort",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortKey>())
    )]
    pub sort: Option<SortKey>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Deadline: 2026-05-01, 2026-05-01T17:30, today, tomorrow, or RFC 3339.
    #[arg(long = "due")]
    pub due: Option<String>,

    /// low, medium or high; anything else means medium.
    #[arg(short = 'p', long = "priority")]
    pub priority: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Show,
    Toggle,
    Dark,
    Light,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, ThemeAction};
    use crate::view::{DateFilter, SortKey};

    #[test]
    fn list_accepts_view_keys() {
        let cli = GlobalCli::try_parse_from([
            "tickoff", "list", "--due", "overdue", "--sort", "priority",
        ])
        .expect("parse");
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.due, Some(DateFilter::Overdue));
        assert_eq!(args.sort, Some(SortKey::Priority));
        assert_eq!(args.status, None);
    }

    #[test]
    fn list_rejects_unknown_sort() {
        assert!(GlobalCli::try_parse_from(["tickoff", "list", "--sort", "newest"]).is_err());
    }

    #[test]
    fn add_joins_words_and_keeps_raw_priority() {
        let cli = GlobalCli::try_parse_from([
            "tickoff", "-v", "add", "buy", "oat", "milk", "-p", "urgent", "--due", "tomorrow",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 1);
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(args.text.join(" "), "buy oat milk");
        assert_eq!(args.priority.as_deref(), Some("urgent"));
        assert_eq!(args.due.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn overrides_and_theme_default() {
        let cli = GlobalCli::try_parse_from([
            "tickoff", "--set", "confirm=off", "--set", "view.sort = date_asc", "theme",
        ])
        .expect("parse");
        assert_eq!(cli.overrides.len(), 2);
        assert_eq!(cli.overrides[1].key, "view.sort");
        assert_eq!(cli.overrides[1].value, "date_asc");
        assert!(matches!(
            cli.command,
            Some(Command::Theme { action: ThemeAction::Show })
        ));
    }
}
