//! Network command handlers.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use linkward_core::{ActionEngine, Network, NetworkAttachment, legal_channels_for};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "VLAN")]
    vlan: u16,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Pool")]
    pool: String,
}

fn access_summary(n: &Network) -> String {
    if n.access.is_empty() {
        "public".into()
    } else {
        n.access.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl From<&Network> for NetworkRow {
    fn from(n: &Network) -> Self {
        Self {
            name: n.name.clone(),
            vlan: n.network_id,
            owner: util::or_dash(n.owner.as_deref()),
            access: access_summary(n),
            pool: if n.allocated { "yes" } else { "no" }.into(),
        }
    }
}

#[derive(Tabled)]
struct AttachmentRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "NIC")]
    nic: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Project")]
    project: String,
}

impl From<&NetworkAttachment> for AttachmentRow {
    fn from(a: &NetworkAttachment) -> Self {
        Self {
            node: a.node.clone(),
            nic: a.nic.clone(),
            channel: a.channel.to_string(),
            project: util::or_dash(a.project.as_deref()),
        }
    }
}

/// A network together with the nodes attached to it.
#[derive(Serialize)]
struct NetworkDetail {
    #[serde(flatten)]
    network: Network,
    connected_nodes: BTreeSet<String>,
}

impl NetworkDetail {
    fn new(network: Network, attachments: Vec<NetworkAttachment>) -> Self {
        Self {
            network,
            connected_nodes: attachments.into_iter().map(|a| a.node).collect(),
        }
    }
}

fn detail(d: &NetworkDetail) -> String {
    let n = &d.network;
    let mut out = String::new();
    let _ = writeln!(out, "Name:      {}", n.name);
    let _ = writeln!(out, "VLAN:      {}", n.network_id);
    let _ = writeln!(out, "Owner:     {}", util::or_dash(n.owner.as_deref()));
    let _ = writeln!(out, "Access:    {}", access_summary(n));
    let channels: Vec<String> = legal_channels_for(n.network_id)
        .iter()
        .map(ToString::to_string)
        .collect();
    let _ = writeln!(out, "Channels:  {}", channels.join(", "));
    let connected = if d.connected_nodes.is_empty() {
        "-".to_owned()
    } else {
        d.connected_nodes.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let _ = writeln!(out, "Connected: {connected}");
    let _ = write!(out, "Created:   {}", util::fmt_time(Some(&n.created_at)));
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    engine: &ActionEngine,
    args: NetworkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = engine.store();

    match args.command {
        NetworkCommand::List => {
            let networks = store.list_networks()?;
            let out = output::render_list(
                &global.output,
                &networks,
                |n| NetworkRow::from(n),
                |n| n.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::Show { name } => {
            let network = store.get_network(&name)?;
            let attachments = store.list_network_attachments(&name, None)?;
            let view = NetworkDetail::new(network, attachments);
            let out =
                output::render_single(&global.output, &view, detail, |d| d.network.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::Create {
            name,
            owner,
            access,
            id,
        } => {
            let network = store.create_network(&name, owner.as_deref(), access, id)?;
            let view = NetworkDetail::new(network, Vec::new());
            let out = output::render_single(&global.output, &view, detail, |d| {
                d.network.network_id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::Delete { name } => {
            let network = store.delete_network(&name)?;
            if !global.quiet {
                eprintln!("Network '{}' deleted (VLAN {})", network.name, network.network_id);
            }
            Ok(())
        }

        NetworkCommand::GrantAccess { network, project } => {
            let network = store.grant_access(&network, &project)?;
            if !global.quiet {
                eprintln!("Project '{project}' may now attach to '{}'", network.name);
            }
            Ok(())
        }

        NetworkCommand::RevokeAccess { network, project } => {
            let network = store.revoke_access(&network, &project)?;
            if !global.quiet {
                eprintln!("Project '{project}' no longer has access to '{}'", network.name);
            }
            Ok(())
        }

        NetworkCommand::ListAttachments { network, project } => {
            let attachments = store.list_network_attachments(&network, project.as_deref())?;
            let out = output::render_list(
                &global.output,
                &attachments,
                |a| AttachmentRow::from(a),
                |a| format!("{}/{} {}", a.node, a.nic, a.channel),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
