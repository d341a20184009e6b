//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod config_cmd;
pub mod context;
pub mod declare;
pub mod mandates;
pub mod util;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    tracing::debug!(command = ?cmd, "dispatching command");
    match cmd {
        Command::Declare(args) => declare::handle(args, global).await,
        Command::Mandates => mandates::handle(global).await,
        Command::Context => context::handle(global).await,
        // Config commands don't need a site session
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "urssaf", &mut std::io::stdout());
            Ok(())
        }
    }
}
