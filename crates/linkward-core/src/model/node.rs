use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::ids::MacAddress;
use super::port::PortRef;

/// A physical machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Project the node is checked out to, if any.
    pub project: Option<String>,
    #[serde(default)]
    pub nics: BTreeMap<String, Nic>,
}

/// A network interface card on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub name: String,
    pub mac: MacAddress,
    /// Switch port this Nic is cabled to.
    pub port: Option<PortRef>,
    /// Channel -> network name, as last confirmed on the switch.
    #[serde(default)]
    pub attachments: BTreeMap<Channel, String>,
}

impl Nic {
    /// The channel `network` is attached on, if any.
    pub fn channel_of(&self, network: &str) -> Option<Channel> {
        self.attachments
            .iter()
            .find(|(_, n)| n.as_str() == network)
            .map(|(c, _)| *c)
    }
}

/// Reference to one Nic of one node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NicRef {
    pub node: String,
    pub nic: String,
}

impl NicRef {
    pub fn new(node: impl Into<String>, nic: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            nic: nic.into(),
        }
    }
}

impl fmt::Display for NicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.nic)
    }
}
