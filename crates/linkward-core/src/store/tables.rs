//! redb table definitions for the linkward store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). The VLAN pool tables are sets keyed by id.

use redb::TableDefinition;

/// Networks keyed by name.
pub(crate) const NETWORKS: TableDefinition<&str, &[u8]> = TableDefinition::new("networks");

/// Nodes (with their Nics) keyed by name.
pub(crate) const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Switch ports keyed by `{switch}/{label}`.
pub(crate) const PORTS: TableDefinition<&str, &[u8]> = TableDefinition::new("ports");

/// Networking actions keyed by action id.
pub(crate) const ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");

/// Unfinished actions keyed by creation sequence.
pub(crate) const ACTION_QUEUE: TableDefinition<u64, &[u8]> = TableDefinition::new("action_queue");

/// VLAN ids available for allocation.
pub(crate) const VLAN_FREE: TableDefinition<u16, ()> = TableDefinition::new("vlan_free");

/// VLAN ids currently handed out.
pub(crate) const VLAN_ALLOCATED: TableDefinition<u16, ()> = TableDefinition::new("vlan_allocated");

/// Counters.
pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the last issued action sequence number.
pub(crate) const ACTION_SEQUENCE: &str = "action_sequence";
