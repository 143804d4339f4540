use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use linkward_switch::VlanId;
use serde::{Deserialize, Serialize};

use super::Channel;

/// A link-layer network backed by one VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// Project that created the network. `None` for administrator networks.
    pub owner: Option<String>,
    /// Projects allowed to attach nodes. Always contains the owner.
    pub access: BTreeSet<String>,
    /// VLAN id backing the network.
    pub network_id: VlanId,
    /// `true` when the id came from the allocator and must be returned
    /// to the pool on deletion.
    pub allocated: bool,
    pub created_at: DateTime<Utc>,
}

impl Network {
    /// Whether `project` may attach nodes to this network. Networks
    /// without an access list are public.
    pub fn grants(&self, project: &str) -> bool {
        self.access.is_empty() || self.access.contains(project)
    }
}

/// A Nic carrying a network, and the channel it carries it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    pub node: String,
    pub nic: String,
    pub channel: Channel,
    /// Project of the node, if it has one.
    pub project: Option<String>,
}
