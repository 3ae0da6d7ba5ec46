use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::board::Board;
use crate::cli::{AddArgs, Command, ListArgs, ThemeAction};
use crate::config::Config;
use crate::datastore::TaskBackend;
use crate::datetime::Clock;
use crate::render::{Renderer, delete_prompt};
use crate::task::{Task, TaskId};
use crate::theme::Theme;

#[instrument(skip(board, cfg, renderer, command))]
pub async fn dispatch<B: TaskBackend, C: Clock>(
    board: &mut Board<B, C>,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let command = command.unwrap_or_else(|| Command::List(ListArgs::default()));
    debug!(?command, "dispatching");

    match command {
        Command::List(args) => cmd_list(board, renderer, args),
        Command::Add(args) => cmd_add(board, renderer, args).await,
        Command::Done { id } => cmd_done(board, renderer, &id).await,
        Command::Delete { id, yes } => {
            let id = resolve_task_id(board.tasks(), &id)?;
            let ask = !yes && cfg.get_bool("confirm").unwrap_or(true);
            let stdin = io::stdin();
            let stdout = io::stdout();
            delete_with_prompt(board, id, ask, &mut stdin.lock(), &mut stdout.lock()).await
        }
        Command::Theme { action } => cmd_theme(board, renderer, action).await,
    }
}

fn cmd_list<B: TaskBackend, C: Clock>(
    board: &mut Board<B, C>,
    renderer: &mut Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    if let Some(status) = args.status {
        board.set_status_filter(status);
    }
    if let Some(due) = args.due {
        board.set_date_filter(due);
    }
    if let Some(sort) = args.sort {
        board.set_sort(sort);
    }

    let visible = board.visible();
    renderer.print_task_table(&visible, board.store().now(), board.store().timezone())?;
    renderer.print_summary(board.counts(), board.query(), visible.len(), board.theme())?;
    Ok(())
}

async fn cmd_add<B: TaskBackend, C: Clock>(
    board: &mut Board<B, C>,
    renderer: &mut Renderer,
    args: AddArgs,
) -> anyhow::Result<()> {
    let text = args.text.join(" ");
    let task = board
        .add_task(&text, args.due.as_deref(), args.priority.as_deref())
        .await?;

    if let Some(raw) = args.due.as_deref()
        && task.due.is_none()
    {
        warn!(due = raw, "deadline not understood; task saved without one");
    }

    renderer.print_task_line("Added", &task, board.store().timezone())?;
    Ok(())
}

async fn cmd_done<B: TaskBackend, C: Clock>(
    board: &mut Board<B, C>,
    renderer: &mut Renderer,
    prefix: &str,
) -> anyhow::Result<()> {
    let id = resolve_task_id(board.tasks(), prefix)?;
    let Some(task) = board.toggle_task(id).await? else {
        bail!("task {prefix} disappeared before it could be updated");
    };

    let verb = if task.completed { "Completed" } else { "Reopened" };
    renderer.print_task_line(verb, &task, board.store().timezone())?;
    Ok(())
}

async fn cmd_theme<B: TaskBackend, C: Clock>(
    board: &mut Board<B, C>,
    renderer: &mut Renderer,
    action: ThemeAction,
) -> anyhow::Result<()> {
    let theme = match action {
        ThemeAction::Show => board.theme(),
        ThemeAction::Toggle => board.toggle_theme().await?,
        ThemeAction::Dark => board.set_theme(Theme::Dark).await?,
        ThemeAction::Light => board.set_theme(Theme::Light).await?,
    };

    renderer.set_theme(theme);
    renderer.print_theme(theme)?;
    Ok(())
}

/// Runs the delete confirmation for `id`. With `ask` unset the request is
/// confirmed straight away.
pub async fn delete_with_prompt<B, C, R, W>(
    board: &mut Board<B, C>,
    id: TaskId,
    ask: bool,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<()>
where
    B: TaskBackend,
    C: Clock,
    R: BufRead,
    W: Write,
{
    if !board.request_delete(id) {
        bail!("no task with id {id}");
    }
    let question = board
        .pending_delete()
        .map(delete_prompt)
        .ok_or_else(|| anyhow!("delete request for {id} was not armed"))?;

    let accepted = if ask {
        confirm_prompt(input, output, &question)?
    } else {
        true
    };

    if !accepted {
        if let Some(task) = board.cancel_delete() {
            writeln!(output, "Kept \"{}\".", task.text)?;
        }
        return Ok(());
    }

    match board.confirm_delete().await? {
        Some(deleted) => {
            info!(id = %deleted, "task deleted");
            writeln!(output, "Deleted.")?;
        }
        None => writeln!(output, "Nothing to delete.")?,
    }
    Ok(())
}

/// Asks a yes/no question. Anything but `y`/`yes` (including end of input)
/// is a no.
pub fn confirm_prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> anyhow::Result<bool> {
    write!(output, "{question}")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Resolves a full id or a unique prefix of its hex form against `tasks`.
pub fn resolve_task_id(tasks: &[Task], prefix: &str) -> anyhow::Result<TaskId> {
    let needle: String = prefix
        .trim()
        .chars()
        .filter(|ch| *ch != '-')
        .collect::<String>()
        .to_ascii_lowercase();

    if needle.is_empty() {
        bail!("task id cannot be empty");
    }

    let mut matches = tasks
        .iter()
        .filter(|task| task.id.simple().to_string().starts_with(&needle));

    let Some(first) = matches.next() else {
        bail!("no task matches id {prefix}");
    };
    if matches.next().is_some() {
        bail!("id {prefix} is ambiguous; type more characters");
    }

    Ok(first.id)
}
