pub mod cli;
pub mod commands;
pub mod config;
pub mod ids;
pub mod kv;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::kv::{
  FileKv,
  KeyValueStore,
  MemoryKv
};
use crate::store::TaskStore;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    ephemeral = cli.ephemeral,
    "starting listo"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.listorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let policy = cfg.delete_policy()?;
  let key = cfg.storage_key();

  let backend: Box<dyn KeyValueStore> =
    if cli.ephemeral {
      Box::new(MemoryKv::new())
    } else {
      let data_dir =
        config::resolve_data_dir(
          &cfg,
          cli.data.as_deref()
        )
        .context(
          "failed to resolve data \
           directory"
        )?;
      Box::new(
        FileKv::open(&data_dir)
          .with_context(|| {
            format!(
              "failed to open storage \
               at {}",
              data_dir.display()
            )
          })?
      )
    };

  let mut store =
    TaskStore::load(backend, key, policy);
  let renderer =
    render::Renderer::new(&cfg)?;

  let command = cli
    .command
    .unwrap_or(cli::Command::List);
  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    command,
    &mut io::stdout().lock()
  )?;

  info!("done");
  Ok(())
}
