pub mod cli;
pub mod commands;
mod config;
mod error;
mod logging;
pub mod services;
pub mod sync;

use std::path::PathBuf;

use clap::Parser;

pub use config::{AppConfig, ConfigOverrides};
pub use error::AppError;

use crate::app::cli::Cli;
use crate::app::commands::CommandContext;
use crate::app::sync::SyncCli;

pub fn run() -> Result<(), AppError> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let context = bootstrap(dotenv, cli.global.overrides())?;

    tracing::debug!(
        token_file = %context.config().token_file.display(),
        api_base_url = %context.config().api_base_url,
        "fitbit cli initialized"
    );

    commands::execute(cli.command, &context)
}

pub fn run_sync() -> Result<(), AppError> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = SyncCli::parse();
    let overrides = ConfigOverrides {
        db_path: cli.db_path.clone(),
        ..cli.global.overrides()
    };
    let context = bootstrap(dotenv, overrides)?;

    tracing::debug!(
        token_file = %context.config().token_file.display(),
        db_path = %context.config().db_path,
        "fitbit sync initialized"
    );

    let mut service = sync::open_service(&context)?;
    sync::execute(cli.command, &mut service)
}

/// `.env` is loaded before argument parsing so clap's `env` fallbacks see it.
fn bootstrap(
    dotenv: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<CommandContext, AppError> {
    logging::init()?;
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let config = AppConfig::from_env()?.with_overrides(overrides)?;
    CommandContext::new(config)
}
