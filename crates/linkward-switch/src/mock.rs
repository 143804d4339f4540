// ── In-memory switch ──
//
// Keeps per-port VLAN state in memory and records every primitive call in
// order. Used for development deployments without hardware and as the
// driver under test for the engine. Failures and latency can be injected
// per primitive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::auth::SwitchKind;
use crate::driver::{Switch, SwitchDriver, VlanId};
use crate::error::Error;

/// Primitive identifiers, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    SetNativeVlan,
    RemoveNativeVlan,
    AddVlanToTrunk,
    RemoveVlanFromTrunk,
    RemoveAllVlansFromTrunk,
    GetNativeVlan,
    GetVlans,
    ShutdownPort,
}

/// One primitive invocation observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub op: MockOp,
    pub interface: String,
    pub vlan: Option<VlanId>,
}

impl MockCall {
    /// Whether this call changed (or attempted to change) port state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self.op, MockOp::GetNativeVlan | MockOp::GetVlans)
    }
}

/// A failure to inject on the next matching call.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Respond like a switch rejecting the request.
    Reject { status: u16, body: String },
    /// Behave like a request that ran past its deadline.
    Timeout,
}

impl MockFailure {
    fn into_error(self) -> Error {
        match self {
            Self::Reject { status, body } => Error::Switch {
                status,
                reason: "Rejected".into(),
                body,
            },
            Self::Timeout => Error::Timeout { timeout_secs: 0 },
        }
    }
}

/// State of one mock interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPort {
    pub native: Option<VlanId>,
    pub trunk: Vec<VlanId>,
    pub shutdown: bool,
}

#[derive(Default)]
struct MockState {
    ports: HashMap<String, MockPort>,
    calls: Vec<MockCall>,
    failures: HashMap<MockOp, VecDeque<MockFailure>>,
    latency: Option<Duration>,
    sessions_opened: usize,
    disconnects: usize,
}

/// In-memory switch. Clones share state.
#[derive(Clone)]
pub struct MockSwitch {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockSwitch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Queue a failure for the next call of `op`. Queued failures are
    /// consumed in order.
    pub async fn fail_next(&self, op: MockOp, failure: MockFailure) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    /// Delay every primitive by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Snapshot of every call made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.lock().await.calls.clone()
    }

    /// Mutating calls only, in order.
    pub async fn mutations(&self) -> Vec<MockCall> {
        self.calls()
            .await
            .into_iter()
            .filter(MockCall::is_mutation)
            .collect()
    }

    /// Current state of `interface` (default if never touched).
    pub async fn port(&self, interface: &str) -> MockPort {
        self.state
            .lock()
            .await
            .ports
            .get(interface)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn sessions_opened(&self) -> usize {
        self.state.lock().await.sessions_opened
    }

    pub async fn disconnects(&self) -> usize {
        self.state.lock().await.disconnects
    }

    async fn invoke<T>(
        &self,
        op: MockOp,
        interface: &str,
        vlan: Option<VlanId>,
        apply: impl FnOnce(&mut MockPort) -> T + Send,
    ) -> Result<T, Error> {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        state.calls.push(MockCall {
            op,
            interface: interface.to_owned(),
            vlan,
        });
        if let Some(failure) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(failure.into_error());
        }
        let port = state.ports.entry(interface.to_owned()).or_default();
        Ok(apply(port))
    }
}

#[async_trait]
impl Switch for MockSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SwitchKind {
        SwitchKind::Mock
    }

    async fn open(&self) -> Result<Box<dyn SwitchDriver>, Error> {
        self.state.lock().await.sessions_opened += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl SwitchDriver for MockSwitch {
    async fn set_native_vlan(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        self.invoke(MockOp::SetNativeVlan, interface, Some(vlan), |p| {
            p.native = Some(vlan);
            p.shutdown = false;
        })
        .await
    }

    async fn remove_native_vlan(&self, interface: &str) -> Result<(), Error> {
        self.invoke(MockOp::RemoveNativeVlan, interface, None, |p| {
            p.native = None;
        })
        .await
    }

    async fn add_vlan_to_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        self.invoke(MockOp::AddVlanToTrunk, interface, Some(vlan), |p| {
            if !p.trunk.contains(&vlan) {
                p.trunk.push(vlan);
            }
            p.shutdown = false;
        })
        .await
    }

    async fn remove_vlan_from_trunk(&self, interface: &str, vlan: VlanId) -> Result<(), Error> {
        self.invoke(MockOp::RemoveVlanFromTrunk, interface, Some(vlan), |p| {
            p.trunk.retain(|v| *v != vlan);
        })
        .await
    }

    async fn remove_all_vlans_from_trunk(&self, interface: &str) -> Result<(), Error> {
        self.invoke(MockOp::RemoveAllVlansFromTrunk, interface, None, |p| {
            p.trunk.clear();
        })
        .await
    }

    async fn get_native_vlan(&self, interface: &str) -> Result<Option<VlanId>, Error> {
        self.invoke(MockOp::GetNativeVlan, interface, None, |p| p.native)
            .await
    }

    async fn get_vlans(&self, interface: &str) -> Result<Vec<VlanId>, Error> {
        self.invoke(MockOp::GetVlans, interface, None, |p| p.trunk.clone())
            .await
    }

    async fn shutdown_port(&self, interface: &str) -> Result<(), Error> {
        self.invoke(MockOp::ShutdownPort, interface, None, |p| {
            p.shutdown = true;
        })
        .await
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.state.lock().await.disconnects += 1;
        Ok(())
    }
}
