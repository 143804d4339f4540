// ── Inventory records ──
//
// Networks, nodes (with their Nics) and switch ports. Nic attachments are
// never written here; only action completion in `queue.rs` changes them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use linkward_switch::VlanId;
use redb::{ReadableTable, WriteTransaction};
use tracing::info;

use super::queue::QueueEntry;
use super::tables::{ACTION_QUEUE, ACTIONS, NETWORKS, NODES, PORTS};
use super::{Store, decode, get_json, put_json, scan_json};
use crate::error::CoreError;
use crate::model::{
    ActionKind, MacAddress, Network, NetworkAttachment, NetworkingAction, Nic, NicRef, Node, Port,
    PortRef,
};

impl Store {
    // ── Networks ─────────────────────────────────────────────────────

    /// Create a network. With `network_id` absent the id comes from the
    /// pool; otherwise the administrator-supplied id is claimed.
    pub fn create_network(
        &self,
        name: &str,
        owner: Option<&str>,
        access: impl IntoIterator<Item = String>,
        network_id: Option<VlanId>,
    ) -> Result<Network, CoreError> {
        check_name("network", name)?;
        let mut access: BTreeSet<String> = access.into_iter().collect();
        if let Some(owner) = owner {
            access.insert(owner.to_owned());
        }

        let txn = self.db.begin_write()?;
        let network = {
            let mut networks = txn.open_table(NETWORKS)?;
            if networks.get(name)?.is_some() {
                return Err(CoreError::conflict("network", name, "already exists"));
            }

            let (id, allocated) = match network_id {
                None => (self.pool.allocate(&txn)?, true),
                Some(id) => {
                    let existing: Vec<Network> = scan_json(&networks, "networks")?;
                    if let Some(other) = existing.iter().find(|n| n.network_id == id) {
                        return Err(CoreError::conflict(
                            "network id",
                            id.to_string(),
                            format!("already used by network '{}'", other.name),
                        ));
                    }
                    (id, self.pool.claim(&txn, id)?)
                }
            };

            let network = Network {
                name: name.to_owned(),
                owner: owner.map(str::to_owned),
                access,
                network_id: id,
                allocated,
                created_at: Utc::now(),
            };
            put_json(&mut networks, "networks", name, &network)?;
            network
        };
        txn.commit()?;

        info!(
            network = %network.name,
            network_id = network.network_id,
            allocated = network.allocated,
            "created network"
        );
        Ok(network)
    }

    /// Delete a network and return its id to the pool if it came from
    /// there. Refused while any Nic is attached or any unfinished action
    /// targets it.
    pub fn delete_network(&self, name: &str) -> Result<Network, CoreError> {
        let txn = self.db.begin_write()?;
        let network = {
            let mut networks = txn.open_table(NETWORKS)?;
            let network: Network = get_json(&networks, "networks", name)?
                .ok_or_else(|| CoreError::not_found("network", name))?;

            let nodes: Vec<Node> = scan_json(&txn.open_table(NODES)?, "nodes")?;
            let attached = nodes.iter().any(|node| {
                node.nics
                    .values()
                    .any(|nic| nic.channel_of(name).is_some())
            });
            if attached {
                return Err(CoreError::conflict(
                    "network",
                    name,
                    "nics are still attached to it",
                ));
            }
            if has_unfinished_action(&txn, |kind| {
                matches!(kind, ActionKind::ModifyPort { network: Some(n), .. } if n == name)
            })? {
                return Err(CoreError::conflict(
                    "network",
                    name,
                    "pending actions still reference it",
                ));
            }

            networks.remove(name)?;
            network
        };
        if network.allocated {
            self.pool.free(&txn, network.network_id)?;
        }
        txn.commit()?;

        info!(network = %name, network_id = network.network_id, "deleted network");
        Ok(network)
    }

    pub fn get_network(&self, name: &str) -> Result<Network, CoreError> {
        let txn = self.db.begin_read()?;
        get_json(&txn.open_table(NETWORKS)?, "networks", name)?
            .ok_or_else(|| CoreError::not_found("network", name))
    }

    pub fn list_networks(&self) -> Result<Vec<Network>, CoreError> {
        let txn = self.db.begin_read()?;
        scan_json(&txn.open_table(NETWORKS)?, "networks")
    }

    /// Nics currently carrying `network`, ordered by node then Nic. With
    /// `project` set, only nodes of that project are listed.
    pub fn list_network_attachments(
        &self,
        network: &str,
        project: Option<&str>,
    ) -> Result<Vec<NetworkAttachment>, CoreError> {
        let txn = self.db.begin_read()?;
        if get_json::<Network, _>(&txn.open_table(NETWORKS)?, "networks", network)?.is_none() {
            return Err(CoreError::not_found("network", network));
        }

        let nodes: Vec<Node> = scan_json(&txn.open_table(NODES)?, "nodes")?;
        let mut attachments = Vec::new();
        for node in &nodes {
            if project.is_some_and(|p| node.project.as_deref() != Some(p)) {
                continue;
            }
            for nic in node.nics.values() {
                if let Some(channel) = nic.channel_of(network) {
                    attachments.push(NetworkAttachment {
                        node: node.name.clone(),
                        nic: nic.name.clone(),
                        channel,
                        project: node.project.clone(),
                    });
                }
            }
        }
        Ok(attachments)
    }

    /// Let `project` attach nodes to `network`.
    pub fn grant_access(&self, network: &str, project: &str) -> Result<Network, CoreError> {
        check_name("project", project)?;
        self.update_network(network, |net| {
            if net.access.is_empty() {
                return Err(CoreError::conflict(
                    "network",
                    &net.name,
                    "public networks have no access list",
                ));
            }
            if !net.access.insert(project.to_owned()) {
                return Err(CoreError::conflict(
                    "network",
                    &net.name,
                    format!("project '{project}' already has access"),
                ));
            }
            Ok(())
        })
    }

    /// Withdraw `project`'s access. The owner keeps access, and a project
    /// whose nodes are attached keeps it until they detach.
    pub fn revoke_access(&self, network: &str, project: &str) -> Result<Network, CoreError> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut networks = txn.open_table(NETWORKS)?;
            let mut net: Network = get_json(&networks, "networks", network)?
                .ok_or_else(|| CoreError::not_found("network", network))?;

            if net.owner.as_deref() == Some(project) {
                return Err(CoreError::conflict(
                    "network",
                    network,
                    "the owner's access cannot be revoked",
                ));
            }
            if !net.access.contains(project) {
                return Err(CoreError::conflict(
                    "network",
                    network,
                    format!("project '{project}' has no access"),
                ));
            }

            let nodes: Vec<Node> = scan_json(&txn.open_table(NODES)?, "nodes")?;
            let in_use = nodes
                .iter()
                .filter(|node| node.project.as_deref() == Some(project))
                .flat_map(|node| node.nics.values())
                .any(|nic| nic.channel_of(network).is_some());
            if in_use {
                return Err(CoreError::conflict(
                    "network",
                    network,
                    format!("nodes of project '{project}' are still attached"),
                ));
            }

            net.access.remove(project);
            put_json(&mut networks, "networks", network, &net)?;
            net
        };
        txn.commit()?;
        info!(network, project, "revoked network access");
        Ok(updated)
    }

    fn update_network(
        &self,
        name: &str,
        apply: impl FnOnce(&mut Network) -> Result<(), CoreError>,
    ) -> Result<Network, CoreError> {
        let txn = self.db.begin_write()?;
        let network = {
            let mut networks = txn.open_table(NETWORKS)?;
            let mut network: Network = get_json(&networks, "networks", name)?
                .ok_or_else(|| CoreError::not_found("network", name))?;
            apply(&mut network)?;
            put_json(&mut networks, "networks", name, &network)?;
            network
        };
        txn.commit()?;
        Ok(network)
    }

    // ── Nodes ────────────────────────────────────────────────────────

    pub fn register_node(&self, name: &str, project: Option<&str>) -> Result<Node, CoreError> {
        check_name("node", name)?;
        let txn = self.db.begin_write()?;
        let node = {
            let mut nodes = txn.open_table(NODES)?;
            if nodes.get(name)?.is_some() {
                return Err(CoreError::conflict("node", name, "already exists"));
            }
            let node = Node {
                name: name.to_owned(),
                project: project.map(str::to_owned),
                nics: BTreeMap::new(),
            };
            put_json(&mut nodes, "nodes", name, &node)?;
            node
        };
        txn.commit()?;
        info!(node = name, project = ?project, "registered node");
        Ok(node)
    }

    pub fn register_nic(&self, node: &str, nic: &str, mac: &str) -> Result<Nic, CoreError> {
        check_name("nic", nic)?;
        let mac = MacAddress::new(mac);
        if !mac.is_well_formed() {
            return Err(CoreError::validation(format!("'{mac}' is not a MAC address")));
        }

        let created = Nic {
            name: nic.to_owned(),
            mac,
            port: None,
            attachments: BTreeMap::new(),
        };
        self.update_node(node, |n| {
            if n.nics.contains_key(nic) {
                return Err(CoreError::conflict(
                    "nic",
                    NicRef::new(node, nic).to_string(),
                    "already exists",
                ));
            }
            n.nics.insert(nic.to_owned(), created.clone());
            Ok(())
        })?;
        Ok(created)
    }

    /// Delete a node. None of its Nics may still be wired or attached.
    pub fn delete_node(&self, name: &str) -> Result<Node, CoreError> {
        let txn = self.db.begin_write()?;
        let node = {
            let mut nodes = txn.open_table(NODES)?;
            let node: Node = get_json(&nodes, "nodes", name)?
                .ok_or_else(|| CoreError::not_found("node", name))?;
            for nic in node.nics.values() {
                if !nic.attachments.is_empty() {
                    return Err(CoreError::conflict(
                        "node",
                        name,
                        format!("nic {} is still attached to networks", nic.name),
                    ));
                }
                if let Some(port) = &nic.port {
                    return Err(CoreError::conflict(
                        "node",
                        name,
                        format!("nic {} is still wired to port {port}", nic.name),
                    ));
                }
            }
            nodes.remove(name)?;
            node
        };
        txn.commit()?;
        info!(node = name, "deleted node");
        Ok(node)
    }

    /// Remove a Nic. It must be unwired first.
    pub fn delete_nic(&self, node: &str, nic: &str) -> Result<(), CoreError> {
        self.update_node(node, |n| {
            let nic_ref = NicRef::new(node, nic).to_string();
            let existing = n
                .nics
                .get(nic)
                .ok_or_else(|| CoreError::not_found("nic", nic_ref.clone()))?;
            if let Some(port) = &existing.port {
                return Err(CoreError::conflict(
                    "nic",
                    nic_ref,
                    format!("still wired to port {port}"),
                ));
            }
            n.nics.remove(nic);
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_node(&self, name: &str) -> Result<Node, CoreError> {
        let txn = self.db.begin_read()?;
        get_json(&txn.open_table(NODES)?, "nodes", name)?
            .ok_or_else(|| CoreError::not_found("node", name))
    }

    pub fn list_nodes(&self) -> Result<Vec<Node>, CoreError> {
        let txn = self.db.begin_read()?;
        scan_json(&txn.open_table(NODES)?, "nodes")
    }

    fn update_node(
        &self,
        name: &str,
        apply: impl FnOnce(&mut Node) -> Result<(), CoreError>,
    ) -> Result<Node, CoreError> {
        let txn = self.db.begin_write()?;
        let node = {
            let mut nodes = txn.open_table(NODES)?;
            let mut node: Node = get_json(&nodes, "nodes", name)?
                .ok_or_else(|| CoreError::not_found("node", name))?;
            apply(&mut node)?;
            put_json(&mut nodes, "nodes", name, &node)?;
            node
        };
        txn.commit()?;
        Ok(node)
    }

    // ── Ports ────────────────────────────────────────────────────────

    pub fn register_port(&self, switch: &str, label: &str) -> Result<Port, CoreError> {
        check_name("switch", switch)?;
        if switch.contains('/') {
            return Err(CoreError::validation(format!(
                "switch name '{switch}' must not contain '/'"
            )));
        }
        if label.is_empty() {
            return Err(CoreError::validation("port label must not be empty"));
        }

        let port = Port {
            port: PortRef::new(switch, label),
            nic: None,
        };
        let key = port.port.key();
        let txn = self.db.begin_write()?;
        {
            let mut ports = txn.open_table(PORTS)?;
            if ports.get(key.as_str())?.is_some() {
                return Err(CoreError::conflict("port", key, "already exists"));
            }
            put_json(&mut ports, "ports", &key, &port)?;
        }
        txn.commit()?;
        info!(port = %port.port, "registered port");
        Ok(port)
    }

    /// Record that `node`/`nic` is cabled to `port`.
    pub fn connect_nic(&self, port: &PortRef, node: &str, nic: &str) -> Result<Port, CoreError> {
        let key = port.key();
        let nic_ref = NicRef::new(node, nic);

        let txn = self.db.begin_write()?;
        let updated = {
            let mut ports = txn.open_table(PORTS)?;
            let mut nodes = txn.open_table(NODES)?;

            let mut record: Port = get_json(&ports, "ports", &key)?
                .ok_or_else(|| CoreError::not_found("port", key.clone()))?;
            let mut owner: Node = get_json(&nodes, "nodes", node)?
                .ok_or_else(|| CoreError::not_found("node", node))?;
            let target = owner
                .nics
                .get_mut(nic)
                .ok_or_else(|| CoreError::not_found("nic", nic_ref.to_string()))?;

            if let Some(existing) = &record.nic {
                return Err(CoreError::conflict(
                    "port",
                    key,
                    format!("already wired to {existing}"),
                ));
            }
            if let Some(existing) = &target.port {
                return Err(CoreError::conflict(
                    "nic",
                    nic_ref.to_string(),
                    format!("already wired to {existing}"),
                ));
            }

            target.port = Some(port.clone());
            record.nic = Some(nic_ref.clone());
            put_json(&mut nodes, "nodes", node, &owner)?;
            put_json(&mut ports, "ports", &key, &record)?;
            record
        };
        txn.commit()?;
        info!(port = %port, nic = %nic_ref, "wired nic to port");
        Ok(updated)
    }

    /// Undo [`connect_nic`](Self::connect_nic). The Nic must have no
    /// attachments and no unfinished actions.
    pub fn detach_nic(&self, port: &PortRef) -> Result<Port, CoreError> {
        let key = port.key();
        let txn = self.db.begin_write()?;
        let updated = {
            let mut ports = txn.open_table(PORTS)?;
            let mut nodes = txn.open_table(NODES)?;

            let mut record: Port = get_json(&ports, "ports", &key)?
                .ok_or_else(|| CoreError::not_found("port", key.clone()))?;
            let Some(nic_ref) = record.nic.clone() else {
                return Err(CoreError::conflict("port", key, "no nic is wired to it"));
            };

            if has_unfinished_action_on_port(&txn, &key)? {
                return Err(CoreError::conflict(
                    "port",
                    key,
                    "pending actions still target it",
                ));
            }

            if let Some(mut owner) = get_json::<Node, _>(&nodes, "nodes", &nic_ref.node)? {
                if let Some(nic) = owner.nics.get_mut(&nic_ref.nic) {
                    if !nic.attachments.is_empty() {
                        return Err(CoreError::conflict(
                            "nic",
                            nic_ref.to_string(),
                            "still attached to networks; revert the port first",
                        ));
                    }
                    nic.port = None;
                }
                put_json(&mut nodes, "nodes", &nic_ref.node, &owner)?;
            }

            record.nic = None;
            put_json(&mut ports, "ports", &key, &record)?;
            record
        };
        txn.commit()?;
        info!(port = %port, "unwired port");
        Ok(updated)
    }

    pub fn delete_port(&self, port: &PortRef) -> Result<(), CoreError> {
        let key = port.key();
        let txn = self.db.begin_write()?;
        {
            let mut ports = txn.open_table(PORTS)?;
            let record: Port = get_json(&ports, "ports", &key)?
                .ok_or_else(|| CoreError::not_found("port", key.clone()))?;
            if let Some(nic) = record.nic {
                return Err(CoreError::conflict(
                    "port",
                    key,
                    format!("still wired to {nic}"),
                ));
            }
            ports.remove(key.as_str())?;
        }
        txn.commit()?;
        info!(port = %port, "deleted port");
        Ok(())
    }

    pub fn get_port(&self, port: &PortRef) -> Result<Port, CoreError> {
        let key = port.key();
        let txn = self.db.begin_read()?;
        get_json(&txn.open_table(PORTS)?, "ports", &key)?
            .ok_or_else(|| CoreError::not_found("port", key))
    }

    pub fn list_ports(&self) -> Result<Vec<Port>, CoreError> {
        let txn = self.db.begin_read()?;
        scan_json(&txn.open_table(PORTS)?, "ports")
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::validation(format!("{kind} name must not be empty")));
    }
    Ok(())
}

/// Whether any queued action satisfies `pred`.
fn has_unfinished_action(
    txn: &WriteTransaction,
    pred: impl Fn(&ActionKind) -> bool,
) -> Result<bool, CoreError> {
    let queue = txn.open_table(ACTION_QUEUE)?;
    let actions = txn.open_table(ACTIONS)?;
    for entry in queue.iter()? {
        let (_, raw) = entry?;
        let entry: QueueEntry = decode("action_queue", raw.value())?;
        let action: Option<NetworkingAction> =
            get_json(&actions, "actions", &entry.action.to_string())?;
        if action.is_some_and(|a| pred(&a.kind)) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_unfinished_action_on_port(txn: &WriteTransaction, port_key: &str) -> Result<bool, CoreError> {
    let queue = txn.open_table(ACTION_QUEUE)?;
    for entry in queue.iter()? {
        let (_, raw) = entry?;
        let entry: QueueEntry = decode("action_queue", raw.value())?;
        if entry.port == port_key {
            return Ok(true);
        }
    }
    Ok(false)
}
