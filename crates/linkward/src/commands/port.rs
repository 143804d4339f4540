//! Switch port command handlers.

use linkward_core::{ActionEngine, Channel, Port, PortRef};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, PortArgs, PortCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "NIC")]
    nic: String,
}

impl From<&Port> for PortRow {
    fn from(p: &Port) -> Self {
        Self {
            port: p.port.to_string(),
            nic: p
                .nic
                .as_ref()
                .map_or_else(|| "-".to_owned(), ToString::to_string),
        }
    }
}

/// One live VLAN assignment read back from a switch.
#[derive(Serialize)]
struct PortVlan {
    port: PortRef,
    channel: Channel,
    vlan: u16,
}

#[derive(Tabled)]
struct PortVlanRow {
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "VLAN")]
    vlan: u16,
}

impl From<&PortVlan> for PortVlanRow {
    fn from(v: &PortVlan) -> Self {
        Self {
            port: v.port.to_string(),
            channel: v.channel.to_string(),
            vlan: v.vlan,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &ActionEngine,
    args: PortArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = engine.store();

    match args.command {
        PortCommand::List => {
            let ports = store.list_ports()?;
            let out = output::render_list(
                &global.output,
                &ports,
                |p| PortRow::from(p),
                |p| p.port.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PortCommand::Register { port } => {
            let port = store.register_port(&port.switch, &port.label)?;
            if !global.quiet {
                eprintln!("Port '{}' registered", port.port);
            }
            Ok(())
        }

        PortCommand::Remove { port } => {
            store.delete_port(&port)?;
            if !global.quiet {
                eprintln!("Port '{port}' removed");
            }
            Ok(())
        }

        PortCommand::Wire { port, node, nic } => {
            store.connect_nic(&port, &node, &nic)?;
            if !global.quiet {
                eprintln!("NIC '{node}/{nic}' wired to '{port}'");
            }
            Ok(())
        }

        PortCommand::Unwire { port } => {
            store.detach_nic(&port)?;
            if !global.quiet {
                eprintln!("Port '{port}' unwired");
            }
            Ok(())
        }

        PortCommand::Revert { port, wait } => {
            let id = engine.enqueue_revert(&port)?;
            util::report_queued(engine, &id, &wait, global).await
        }

        PortCommand::Networks { ports } => {
            let live = engine.get_port_networks(&ports).await?;
            let vlans: Vec<PortVlan> = live
                .into_iter()
                .flat_map(|(port, networks)| {
                    networks.into_iter().map(move |(channel, vlan)| PortVlan {
                        port: port.clone(),
                        channel,
                        vlan,
                    })
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &vlans,
                |v| PortVlanRow::from(v),
                |v| format!("{} {} {}", v.port, v.channel, v.vlan),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
