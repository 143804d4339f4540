//! Config subcommand handlers.

use linkward_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Copy of `config` safe to print.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for profile in config.switches.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    config
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(linkward_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let config = linkward_config::load_config(global.config.as_deref())?;
            let config = redacted(&config);
            let rendered = linkward_config::render_config(&config)?;
            let out = output::render_single(
                &global.output,
                &config,
                |_| rendered.trim_end().to_owned(),
                |c| c.store_path().display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
