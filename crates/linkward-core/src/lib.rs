//! Network control plane for linkward: VLAN allocation, the switch session
//! protocol, and the durable networking action engine.
//!
//! - **[`ActionEngine`]** — Accepts connect/detach/revert requests,
//!   validates them synchronously, records them as PENDING actions in the
//!   [`Store`], and runs them on worker tasks. Actions on one switch port
//!   execute strictly in creation order; actions on different ports run
//!   concurrently. Transport-level failures are retried a bounded number of
//!   times; everything else resolves the action to ERROR.
//!
//! - **[`Store`]** — redb-backed durable state: networks, nodes and their
//!   Nics, switch ports, the action queue and the VLAN pool. Claims,
//!   completions and allocations are single write transactions.
//!
//! - **[`SwitchSession`]** — `modify_port` / `revert_port` /
//!   `get_port_networks` written once over the eight
//!   [`SwitchDriver`](linkward_switch::SwitchDriver) primitives.
//!
//! - **Allocator** ([`allocator`]) — channel legality rules and the VLAN id
//!   pool.

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use allocator::{
    PoolRange, channel_is_legal, default_channel, is_legal_channel_for, legal_channels_for,
    validate_network_id,
};
pub use config::EngineConfig;
pub use engine::ActionEngine;
pub use error::CoreError;
pub use registry::SwitchRegistry;
pub use session::{PortNetworks, SwitchSession};
pub use store::{ActionFilter, Outcome, Store, WITHDRAWN};

pub use model::{
    ActionId, ActionKind, ActionState, ActionStatus, Channel, ChannelParseError, MacAddress,
    Network, NetworkAttachment, NetworkingAction, Nic, NicRef, Node, Port, PortRef,
};
