//! `linkward serve`: run the action workers until interrupted.

use linkward_core::ActionEngine;
use tracing::info;

use crate::error::CliError;

pub async fn handle(engine: &ActionEngine) -> Result<(), CliError> {
    engine.start().await?;
    info!(
        switches = ?engine.registry().names(),
        pending = engine.store().pending_count()?,
        "serving"
    );

    let signal = tokio::signal::ctrl_c().await;
    info!("shutting down; in-flight actions finish first");
    engine.shutdown().await;
    signal?;
    Ok(())
}
