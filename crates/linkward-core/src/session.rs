// ── Switch session ──
//
// The vendor-agnostic half of the switch protocol. Every vendor supplies
// the eight primitives of `SwitchDriver`; the algorithms that turn
// "put this network on this channel" into primitive calls live here once.

use std::collections::BTreeMap;

use linkward_switch::{Switch, SwitchDriver, VlanId, is_valid_vlan_id};
use tracing::{debug, error};

use crate::allocator::channel_is_legal;
use crate::error::CoreError;
use crate::model::{Channel, PortRef};

/// Channel assignments observed on one port: native first, then trunk
/// members in the order the switch reports them.
pub type PortNetworks = Vec<(Channel, VlanId)>;

/// An open management session on one switch.
pub struct SwitchSession {
    switch: String,
    driver: Box<dyn SwitchDriver>,
}

impl SwitchSession {
    /// Open a session on `switch`.
    pub async fn open(switch: &dyn Switch) -> Result<Self, CoreError> {
        let driver = switch.open().await?;
        debug!(switch = switch.name(), "opened switch session");
        Ok(Self::new(switch.name(), driver))
    }

    pub fn new(switch: impl Into<String>, driver: Box<dyn SwitchDriver>) -> Self {
        Self {
            switch: switch.into(),
            driver,
        }
    }

    /// Registry name of the switch this session talks to.
    pub fn switch(&self) -> &str {
        &self.switch
    }

    /// Put the network with id `network_id` on `channel` of `port`, or
    /// clear `channel` when `network_id` is `None`.
    ///
    /// Clearing the native channel also shuts the port down, so a port
    /// without a native VLAN never passes untagged traffic. Illegal
    /// requests fail with [`CoreError::ProtocolContract`] before any
    /// primitive is called.
    pub async fn modify_port(
        &self,
        port: &str,
        channel: Channel,
        network_id: Option<VlanId>,
    ) -> Result<(), CoreError> {
        self.check_modify(port, channel, network_id)?;

        match (channel, network_id) {
            (Channel::Native, None) => {
                self.driver.remove_native_vlan(port).await?;
                self.driver.shutdown_port(port).await?;
            }
            (Channel::Native, Some(id)) => self.driver.set_native_vlan(port, id).await?,
            (Channel::Tagged(n), None) => self.driver.remove_vlan_from_trunk(port, n).await?,
            (Channel::Tagged(n), Some(_)) => self.driver.add_vlan_to_trunk(port, n).await?,
        }
        debug!(
            switch = %self.switch,
            port,
            channel = %channel,
            network_id = ?network_id,
            "modified port"
        );
        Ok(())
    }

    /// String-channel form of [`modify_port`](Self::modify_port). A
    /// malformed channel is a contract violation.
    pub async fn modify_port_on(
        &self,
        port: &str,
        channel: &str,
        network_id: Option<VlanId>,
    ) -> Result<(), CoreError> {
        let channel: Channel = channel.parse().map_err(|e| {
            let err = CoreError::contract(format!("{e}"));
            error!(switch = %self.switch, port, error = %err, "refusing to modify port");
            err
        })?;
        self.modify_port(port, channel, network_id).await
    }

    fn check_modify(
        &self,
        port: &str,
        channel: Channel,
        network_id: Option<VlanId>,
    ) -> Result<(), CoreError> {
        let violation = match (channel, network_id) {
            (Channel::Tagged(n), _) if !channel_is_legal(channel, n) => {
                Some(format!("channel {channel} is not a legal trunk channel"))
            }
            (Channel::Tagged(n), Some(id)) if id != n => Some(format!(
                "channel {channel} cannot carry network id {id}"
            )),
            (Channel::Native, Some(id)) if !is_valid_vlan_id(id) => {
                Some(format!("network id {id} is not a valid VLAN id"))
            }
            _ => None,
        };
        match violation {
            None => Ok(()),
            Some(message) => {
                let err = CoreError::contract(message);
                error!(switch = %self.switch, port, error = %err, "refusing to modify port");
                Err(err)
            }
        }
    }

    /// Strip every VLAN from `port` and shut it down. Idempotent.
    pub async fn revert_port(&self, port: &str) -> Result<(), CoreError> {
        self.driver.remove_all_vlans_from_trunk(port).await?;
        if self.driver.get_native_vlan(port).await?.is_some() {
            self.driver.remove_native_vlan(port).await?;
        }
        self.driver.shutdown_port(port).await?;
        debug!(switch = %self.switch, port, "reverted port");
        Ok(())
    }

    /// Read back what each of `ports` carries. For reconciliation and
    /// audit only; mutations never consult it.
    pub async fn get_port_networks(
        &self,
        ports: &[PortRef],
    ) -> Result<BTreeMap<PortRef, PortNetworks>, CoreError> {
        let mut out = BTreeMap::new();
        for port in ports {
            if port.switch != self.switch {
                return Err(CoreError::contract(format!(
                    "port {port} does not belong to switch '{}'",
                    self.switch
                )));
            }
            let mut networks = Vec::new();
            if let Some(native) = self.driver.get_native_vlan(&port.label).await? {
                networks.push((Channel::Native, native));
            }
            for vlan in self.driver.get_vlans(&port.label).await? {
                networks.push((Channel::Tagged(vlan), vlan));
            }
            out.insert(port.clone(), networks);
        }
        Ok(out)
    }

    /// Release the session.
    pub async fn disconnect(self) -> Result<(), CoreError> {
        self.driver.disconnect().await?;
        debug!(switch = %self.switch, "closed switch session");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use linkward_switch::{MockCall, MockFailure, MockOp, MockPort, MockSwitch};
    use pretty_assertions::assert_eq;

    use super::*;

    async fn session(mock: &MockSwitch) -> SwitchSession {
        SwitchSession::open(mock).await.unwrap()
    }

    fn port(label: &str) -> PortRef {
        PortRef::new("sw0", label)
    }

    #[tokio::test]
    async fn tagged_clear_then_add_reports_channel() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;

        s.modify_port("eth1", Channel::Tagged(42), None).await.unwrap();
        s.modify_port("eth1", Channel::Tagged(42), Some(42))
            .await
            .unwrap();

        let networks = s.get_port_networks(&[port("eth1")]).await.unwrap();
        assert_eq!(networks[&port("eth1")], vec![(Channel::Tagged(42), 42)]);
    }

    #[tokio::test]
    async fn native_connect_and_fail_closed_detach() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;

        s.modify_port("eth1", Channel::Native, Some(100))
            .await
            .unwrap();
        assert_eq!(mock.port("eth1").await.native, Some(100));

        s.modify_port("eth1", Channel::Native, None).await.unwrap();
        let state = mock.port("eth1").await;
        assert_eq!(state.native, None);
        assert!(state.shutdown);

        let ops: Vec<MockOp> = mock.mutations().await.iter().map(|c| c.op).collect();
        assert_eq!(
            ops,
            vec![
                MockOp::SetNativeVlan,
                MockOp::RemoveNativeVlan,
                MockOp::ShutdownPort
            ]
        );
    }

    #[tokio::test]
    async fn mismatched_network_id_fails_before_any_call() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;

        let err = s
            .modify_port("eth1", Channel::Tagged(42), Some(43))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolContract { .. }));

        let err = s
            .modify_port("eth1", Channel::Native, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolContract { .. }));

        let err = s
            .modify_port_on("eth1", "vlan/abc", Some(42))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolContract { .. }));

        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn revert_is_idempotent() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;
        s.modify_port("eth1", Channel::Native, Some(100))
            .await
            .unwrap();
        s.modify_port("eth1", Channel::Tagged(200), Some(200))
            .await
            .unwrap();
        s.modify_port("eth1", Channel::Tagged(201), Some(201))
            .await
            .unwrap();

        s.revert_port("eth1").await.unwrap();
        let once = s.get_port_networks(&[port("eth1")]).await.unwrap();
        let state_once = mock.port("eth1").await;

        s.revert_port("eth1").await.unwrap();
        let twice = s.get_port_networks(&[port("eth1")]).await.unwrap();

        assert_eq!(once, twice);
        assert!(once[&port("eth1")].is_empty());
        assert_eq!(
            state_once,
            MockPort {
                native: None,
                trunk: vec![],
                shutdown: true
            }
        );
        assert_eq!(mock.port("eth1").await, state_once);

        // The second revert skips remove_native_vlan: nothing was set.
        let removes = mock
            .calls()
            .await
            .iter()
            .filter(|c| c.op == MockOp::RemoveNativeVlan)
            .count();
        assert_eq!(removes, 1);
    }

    #[tokio::test]
    async fn port_networks_native_first_then_trunk_order() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;
        s.modify_port("eth1", Channel::Tagged(300), Some(300))
            .await
            .unwrap();
        s.modify_port("eth1", Channel::Tagged(120), Some(120))
            .await
            .unwrap();
        s.modify_port("eth1", Channel::Native, Some(7)).await.unwrap();

        let networks = s
            .get_port_networks(&[port("eth1"), port("eth2")])
            .await
            .unwrap();
        assert_eq!(
            networks[&port("eth1")],
            vec![
                (Channel::Native, 7),
                (Channel::Tagged(300), 300),
                (Channel::Tagged(120), 120)
            ]
        );
        assert!(networks[&port("eth2")].is_empty());
    }

    #[tokio::test]
    async fn foreign_port_is_a_contract_violation() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;
        let err = s
            .get_port_networks(&[PortRef::new("sw1", "eth1")])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolContract { .. }));
    }

    #[tokio::test]
    async fn switch_rejection_surfaces_as_switch_error() {
        let mock = MockSwitch::new("sw0");
        mock.fail_next(
            MockOp::AddVlanToTrunk,
            MockFailure::Reject {
                status: 500,
                body: "no such vlan".into(),
            },
        )
        .await;
        let s = session(&mock).await;
        let err = s
            .modify_port("eth1", Channel::Tagged(42), Some(42))
            .await
            .unwrap_err();
        match err {
            CoreError::Switch { body, .. } => assert_eq!(body.as_deref(), Some("no such vlan")),
            other => panic!("expected Switch, got {other:?}"),
        }
        assert_eq!(
            mock.calls().await,
            vec![MockCall {
                op: MockOp::AddVlanToTrunk,
                interface: "eth1".into(),
                vlan: Some(42)
            }]
        );
    }

    #[tokio::test]
    async fn disconnect_releases_driver() {
        let mock = MockSwitch::new("sw0");
        let s = session(&mock).await;
        s.disconnect().await.unwrap();
        assert_eq!(mock.sessions_opened().await, 1);
        assert_eq!(mock.disconnects().await, 1);
    }
}
