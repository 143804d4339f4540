// ── Domain model ──
//
// Canonical record shapes persisted by the store and handed to callers.

pub mod action;
pub mod channel;
pub mod ids;
pub mod network;
pub mod node;
pub mod port;

pub use action::{ActionKind, ActionState, ActionStatus, NetworkingAction};
pub use channel::{Channel, ChannelParseError};
pub use ids::{ActionId, MacAddress};
pub use network::{Network, NetworkAttachment};
pub use node::{Nic, NicRef, Node};
pub use port::{Port, PortRef};
