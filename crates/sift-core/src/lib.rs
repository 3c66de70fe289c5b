pub mod cli;
pub mod commands;
pub mod config;
pub mod date_field;
pub mod datetime;
pub mod dismiss;
pub mod error;
pub mod layout;
pub mod panel;
pub mod position;
pub mod presets;
pub mod render;
pub mod schema;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::datetime::Clock;

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
    command = cli.command.name(),
    "starting sift CLI"
  );

  let settings = config::Settings::load(
    cli.settings.as_deref()
  )
  .context(
    "failed to load sift settings"
  )?;
  debug!(
    files = ?settings.loaded_files,
    timezone = ?settings.timezone,
    "resolved settings"
  );

  let clock = settings.clock();
  debug!(today = %clock.today(), "resolved clock");

  let mut renderer = render::Renderer::new(
    std::env::var_os("NO_COLOR").is_none()
  );

  commands::dispatch(
    &settings,
    &clock,
    &mut renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
