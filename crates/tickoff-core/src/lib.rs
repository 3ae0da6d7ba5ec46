pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod datastore;
pub mod datetime;
pub mod render;
pub mod store;
pub mod task;
pub mod theme;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use board::{
  Board,
  BoardCounts
};
pub use confirm::DeleteConfirmation;
pub use datastore::{
  FileBackend,
  MemoryBackend,
  TaskBackend
};
pub use store::{
  StoreError,
  StoreResult,
  TaskStore,
  ValidationError
};
pub use task::{
  Priority,
  Task,
  TaskId
};
pub use theme::{
  Theme,
  ThemeToggle
};
pub use view::{
  DateFilter,
  SortKey,
  StatusFilter,
  ViewQuery,
  visible_tasks
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tickoff"
  );

  let mut cfg = config::Config::load(
    cli.rc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "config ready");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend =
    datastore::FileBackend::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let query = cfg.view_query()?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(async move {
    let mut board = Board::open(
      TaskStore::new(backend),
      query
    )
    .await?;

    let mut renderer =
      render::Renderer::new(
        &cfg,
        board.theme()
      )?;

    commands::dispatch(
      &mut board,
      &cfg,
      &mut renderer,
      cli.command
    )
    .await?;

    anyhow::Ok(())
  })?;

  info!("done");
  Ok(())
}
