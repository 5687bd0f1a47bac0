pub mod api;
pub mod charts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod datetime;
pub mod render;
pub mod session;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
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
    "starting taskdash"
  );

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  let overrides = cli.config_overrides();
  debug!(?overrides, "flag overrides");
  cfg.apply_overrides(overrides);

  let renderer =
    render::Renderer::new(&cfg)?;
  let api =
    api::ApiClient::from_config(&cfg)?;
  let session_path =
    cfg.session_path().context(
      "failed to resolve session \
       location"
    )?;
  let sessions =
    session::SessionStore::new(
      &session_path
    );
  let clock =
    datetime::DayClock::from_config(
      &cfg
    )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let mut env = commands::CommandEnv {
    dashboard: dashboard::Dashboard::new(
      api, sessions, clock
    ),
    runtime,
    renderer,
    cfg: &cfg
  };

  commands::dispatch(
    &mut env,
    cli.command
  )?;

  info!("done");
  Ok(())
}
