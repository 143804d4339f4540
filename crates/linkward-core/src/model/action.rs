// ── Networking actions ──
//
// The durable record of one requested port mutation. The request half is
// immutable once written; only the execution half (status, diagnostic,
// claim and completion timestamps) changes, and status only moves from
// PENDING to exactly one terminal state.

use chrono::{DateTime, Utc};
use linkward_switch::VlanId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::channel::Channel;
use super::ids::ActionId;
use super::node::NicRef;
use super::port::PortRef;

/// Execution status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ActionStatus {
    Pending,
    Done,
    Error,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What the action does to the port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Attach `network` on `channel`, or detach whatever is on `channel`
    /// when `network` is `None`.
    ModifyPort {
        channel: Channel,
        network: Option<String>,
        /// VLAN id of `network`, captured at enqueue time.
        vlan: Option<VlanId>,
    },
    /// Strip every VLAN from the port and shut it down.
    RevertPort,
}

/// A queued, running or finished port mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub nic: NicRef,
    pub port: PortRef,
    pub status: ActionStatus,
    pub diagnostic: Option<String>,
    /// Position in the global creation order.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
}

impl NetworkingAction {
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    pub fn state(&self) -> ActionState {
        ActionState {
            status: self.status,
            diagnostic: self.diagnostic.clone(),
        }
    }

    /// Short human description, e.g. `connect net1 on vlan/100`.
    pub fn describe(&self) -> String {
        match &self.kind {
            ActionKind::ModifyPort {
                channel,
                network: Some(net),
                ..
            } => format!("connect {net} on {channel}"),
            ActionKind::ModifyPort {
                channel,
                network: None,
                ..
            } => format!("detach {channel}"),
            ActionKind::RevertPort => "revert port".to_owned(),
        }
    }
}

/// What a status poll returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub status: ActionStatus,
    pub diagnostic: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(ActionStatus::Pending.to_string(), "PENDING");
        assert_eq!("done".parse::<ActionStatus>().unwrap(), ActionStatus::Done);
        assert_eq!(
            serde_json::to_string(&ActionStatus::Error).unwrap(),
            r#""ERROR""#
        );
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(ActionStatus::Done.is_terminal());
        assert!(ActionStatus::Error.is_terminal());
    }

    #[test]
    fn kind_serializes_with_tag() {
        let kind = ActionKind::ModifyPort {
            channel: Channel::Tagged(100),
            network: Some("net1".into()),
            vlan: Some(100),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "modify_port");
        assert_eq!(json["channel"], "vlan/100");
    }
}
