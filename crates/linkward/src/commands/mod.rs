//! Command handlers, one module per top-level subcommand.

pub mod action;
pub mod config_cmd;
pub mod network;
pub mod node;
pub mod port;
pub mod serve;
pub mod util;

use clap::CommandFactory;

use crate::cli::{Cli, CompletionsArgs};

/// Write shell completions for `args.shell` to stdout.
pub fn completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "linkward", &mut std::io::stdout());
}
