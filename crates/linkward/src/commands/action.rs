//! Action command handlers.

use std::fmt::Write as _;

use linkward_core::{ActionEngine, ActionFilter, ActionState, NetworkingAction};
use tabled::Tabled;
use tracing::info;

use crate::cli::{ActionArgs, ActionCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "NIC")]
    nic: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Tries")]
    attempts: u32,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&NetworkingAction> for ActionRow {
    fn from(a: &NetworkingAction) -> Self {
        let status = if a.is_claimed() && !a.status.is_terminal() {
            "RUNNING".to_owned()
        } else {
            a.status.to_string()
        };
        Self {
            id: a.id.to_string(),
            action: a.describe(),
            nic: a.nic.to_string(),
            port: a.port.to_string(),
            status,
            attempts: a.attempts,
            created: util::fmt_time(Some(&a.created_at)),
        }
    }
}

fn detail(a: &NetworkingAction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID:        {}", a.id);
    let _ = writeln!(out, "Action:    {}", a.describe());
    let _ = writeln!(out, "NIC:       {}", a.nic);
    let _ = writeln!(out, "Port:      {}", a.port);
    let _ = writeln!(out, "Status:    {}", a.status);
    let _ = writeln!(out, "Attempts:  {}", a.attempts);
    let _ = writeln!(out, "Created:   {}", util::fmt_time(Some(&a.created_at)));
    let _ = writeln!(out, "Claimed:   {}", util::fmt_time(a.claimed_at.as_ref()));
    let _ = write!(out, "Finished:  {}", util::fmt_time(a.finished_at.as_ref()));
    if let Some(diagnostic) = &a.diagnostic {
        let _ = write!(out, "\nDiagnostic: {diagnostic}");
    }
    out
}

fn state_detail(s: &ActionState) -> String {
    match &s.diagnostic {
        Some(diagnostic) => format!("{}: {diagnostic}", s.status),
        None => s.status.to_string(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &ActionEngine,
    args: ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ActionCommand::List { status, port } => {
            let actions = engine.list_actions(&ActionFilter { status, port })?;
            let out = output::render_list(
                &global.output,
                &actions,
                |a| ActionRow::from(a),
                |a| a.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActionCommand::Status { id } => {
            let state = engine.get_status(&id)?;
            let out = output::render_single(&global.output, &state, state_detail, |s| {
                s.status.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActionCommand::Show { id } => {
            let action = engine.get_action(&id)?;
            let out =
                output::render_single(&global.output, &action, detail, |a| a.status.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActionCommand::Cancel { id } => {
            let state = engine.cancel(&id)?;
            let out = output::render_single(&global.output, &state, state_detail, |s| {
                s.status.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActionCommand::Run => {
            let released = engine.store().recover()?;
            if released > 0 {
                info!(released, "re-queued actions interrupted by a previous run");
            }
            let ran = engine.run_until_idle().await?;
            if !global.quiet {
                eprintln!("{ran} action(s) executed");
            }
            Ok(())
        }
    }
}
