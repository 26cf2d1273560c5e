//! Subcommand handlers.

pub mod run;
pub mod status;

use domestia_config::Config;

use crate::cli::Command;
use crate::error::CliError;

/// Route a parsed subcommand to its handler.
pub async fn dispatch(cmd: Command, config: &Config) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(config).await,
        Command::Status(args) => status::handle(config, &args).await,
    }
}
