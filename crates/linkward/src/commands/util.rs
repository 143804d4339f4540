//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use linkward_core::{ActionEngine, ActionId, ActionStatus, Store};
use tracing::debug;

use crate::cli::{GlobalOpts, WaitArgs};
use crate::error::CliError;
use crate::output;

/// Load the config, open the store and build the engine. Workers are
/// not started.
pub fn open_engine(global: &GlobalOpts) -> Result<ActionEngine, CliError> {
    let config = linkward_config::load_config(global.config.as_deref())?;
    let path = config.store_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), "opening store");

    let store = Store::open(&path, config.pool_range()?)?;
    let registry = linkward_config::build_registry(&config)?;
    Ok(ActionEngine::new(
        Arc::new(store),
        registry,
        config.engine_config(),
    ))
}

/// Report a freshly queued action. With `--wait`, run workers in this
/// process until it resolves and fail if it ends in ERROR.
pub async fn report_queued(
    engine: &ActionEngine,
    id: &ActionId,
    wait: &WaitArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(seconds) = wait.wait else {
        output::print_output(&id.to_string(), global.quiet);
        if !global.quiet {
            eprintln!("Action queued; `linkward serve` or --wait executes it");
        }
        return Ok(());
    };

    engine.start().await?;
    let state = engine.wait_for(id, Duration::from_secs(seconds)).await;
    engine.shutdown().await;
    let state = state?;

    match state.status {
        ActionStatus::Done => {
            output::print_output(&id.to_string(), global.quiet);
            Ok(())
        }
        ActionStatus::Error => Err(CliError::ActionFailed {
            action_id: id.to_string(),
            diagnostic: state.diagnostic.unwrap_or_default(),
        }),
        ActionStatus::Pending => Err(CliError::WaitTimedOut {
            action_id: id.to_string(),
            seconds,
        }),
    }
}

pub fn fmt_time(at: Option<&DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}
