mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LogFormat};
use crate::commands::util;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The daemon reports action outcomes at info; one-shot commands stay quiet.
    let floor = u8::from(matches!(cli.command, Command::Serve));
    init_tracing(cli.global.verbose.max(floor), &cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: &LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;

    match cli.command {
        Command::Completions(args) => {
            commands::completions(&args);
            Ok(())
        }
        Command::Config(args) => commands::config_cmd::handle(args, global),
        Command::Serve => commands::serve::handle(&util::open_engine(global)?).await,
        Command::Network(args) => commands::network::handle(&util::open_engine(global)?, args, global),
        Command::Node(args) => commands::node::handle(&util::open_engine(global)?, args, global).await,
        Command::Port(args) => commands::port::handle(&util::open_engine(global)?, args, global).await,
        Command::Action(args) => {
            commands::action::handle(&util::open_engine(global)?, args, global).await
        }
    }
}
