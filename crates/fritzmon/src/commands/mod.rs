//! Command dispatch: bridges CLI args -> hub operations -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod monitor;
pub mod parse;

use crate::cli::{Command, GlobalOpts};
use crate::config::ResolvedProfile;
use crate::error::CliError;

/// Dispatch a router-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    resolved: ResolvedProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(resolved, &args, global).await,
        Command::Devices(args) => devices::handle(resolved, args, global).await,
        // Config, Parse and Completions are handled before dispatch
        Command::Config(_) | Command::Parse(_) | Command::Completions(_) => unreachable!(),
    }
}
