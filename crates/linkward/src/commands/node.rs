//! Node and NIC command handlers.

use std::fmt::Write as _;

use linkward_core::{ActionEngine, NicRef, Node, default_channel};
use tabled::Tabled;

use crate::cli::{GlobalOpts, NodeArgs, NodeCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "NICs")]
    nics: usize,
    #[tabled(rename = "Attachments")]
    attachments: usize,
}

impl From<&Node> for NodeRow {
    fn from(n: &Node) -> Self {
        Self {
            name: n.name.clone(),
            project: util::or_dash(n.project.as_deref()),
            nics: n.nics.len(),
            attachments: n.nics.values().map(|nic| nic.attachments.len()).sum(),
        }
    }
}

fn detail(n: &Node) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name:     {}", n.name);
    let _ = write!(out, "Project:  {}", util::or_dash(n.project.as_deref()));
    for nic in n.nics.values() {
        let port = nic
            .port
            .as_ref()
            .map_or_else(|| "unwired".to_owned(), ToString::to_string);
        let _ = write!(out, "\n\nNIC {}  ({}, port {port})", nic.name, nic.mac);
        if nic.attachments.is_empty() {
            let _ = write!(out, "\n  no attachments");
        }
        for (channel, network) in &nic.attachments {
            let _ = write!(out, "\n  {channel:<14} {network}");
        }
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &ActionEngine,
    args: NodeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = engine.store();

    match args.command {
        NodeCommand::List => {
            let nodes = store.list_nodes()?;
            let out = output::render_list(
                &global.output,
                &nodes,
                |n| NodeRow::from(n),
                |n| n.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodeCommand::Show { name } => {
            let node = store.get_node(&name)?;
            let out = output::render_single(&global.output, &node, detail, |n| n.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodeCommand::Register { name, project } => {
            let node = store.register_node(&name, project.as_deref())?;
            if !global.quiet {
                eprintln!("Node '{}' registered", node.name);
            }
            Ok(())
        }

        NodeCommand::Delete { name } => {
            store.delete_node(&name)?;
            if !global.quiet {
                eprintln!("Node '{name}' deleted");
            }
            Ok(())
        }

        NodeCommand::RegisterNic { node, nic, mac } => {
            let nic = store.register_nic(&node, &nic, &mac)?;
            if !global.quiet {
                eprintln!("NIC '{node}/{}' registered ({})", nic.name, nic.mac);
            }
            Ok(())
        }

        NodeCommand::RemoveNic { node, nic } => {
            store.delete_nic(&node, &nic)?;
            if !global.quiet {
                eprintln!("NIC '{node}/{nic}' removed");
            }
            Ok(())
        }

        NodeCommand::Connect {
            node,
            nic,
            network,
            channel,
            wait,
        } => {
            let channel = channel.unwrap_or_else(|| default_channel().to_string());
            let id = engine.enqueue(&NicRef::new(node, nic), Some(&network), &channel)?;
            util::report_queued(engine, &id, &wait, global).await
        }

        NodeCommand::Detach {
            node,
            nic,
            channel,
            wait,
        } => {
            let channel = channel.unwrap_or_else(|| default_channel().to_string());
            let id = engine.enqueue(&NicRef::new(node, nic), None, &channel)?;
            util::report_queued(engine, &id, &wait, global).await
        }
    }
}
