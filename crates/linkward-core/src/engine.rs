// ── Networking action engine ──
//
// Request side: validate, record a PENDING action, wake a worker.
// Worker side: claim the next runnable action, open a session on the
// port's switch, apply it, release the session, resolve the action.
//
// All coordination goes through the durable store. Workers share nothing
// in memory beyond a wakeup signal, so the per-port ordering and
// exclusive-claim guarantees hold across restarts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{
    ActionId, ActionKind, ActionState, Channel, NetworkingAction, NicRef, PortRef,
};
use crate::registry::SwitchRegistry;
use crate::session::{PortNetworks, SwitchSession};
use crate::store::{ActionFilter, Outcome, Store};

const STATUS_POLL: Duration = Duration::from_millis(20);

/// The networking action engine.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Request-side methods may be
/// used without [`start`](Self::start)ing workers; actions then stay
/// PENDING until a worker (here or in another process sharing the store)
/// picks them up.
#[derive(Clone)]
pub struct ActionEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<Store>,
    registry: SwitchRegistry,
    config: EngineConfig,
    wake: Notify,
    workers: Mutex<Workers>,
}

/// The running worker set. A fresh token is issued for every start.
#[derive(Default)]
struct Workers {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ActionEngine {
    pub fn new(store: Arc<Store>, registry: SwitchRegistry, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                registry,
                config,
                wake: Notify::new(),
                workers: Mutex::new(Workers::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ── Request side ─────────────────────────────────────────────────

    /// Ask for `network` to be attached to `nic` on `channel`, or for
    /// `channel` to be cleared when `network` is `None`.
    ///
    /// Everything that can be checked without the switch is checked here;
    /// a rejected request leaves no record. The returned id is for
    /// [`get_status`](Self::get_status).
    pub fn enqueue(
        &self,
        nic: &NicRef,
        network: Option<&str>,
        channel: &str,
    ) -> Result<ActionId, CoreError> {
        let channel: Channel = channel
            .parse()
            .map_err(|e| CoreError::validation(format!("{e}")))?;
        let action = self.inner.store.enqueue_modify(nic, network, channel)?;
        self.inner.wake.notify_one();
        Ok(action.id)
    }

    /// Ask for `port` to be stripped of every VLAN and shut down.
    pub fn enqueue_revert(&self, port: &PortRef) -> Result<ActionId, CoreError> {
        let action = self.inner.store.enqueue_revert(port)?;
        self.inner.wake.notify_one();
        Ok(action.id)
    }

    /// Non-blocking status poll.
    pub fn get_status(&self, id: &ActionId) -> Result<ActionState, CoreError> {
        Ok(self.inner.store.get_action(id)?.state())
    }

    /// Full record of one action.
    pub fn get_action(&self, id: &ActionId) -> Result<NetworkingAction, CoreError> {
        self.inner.store.get_action(id)
    }

    /// Withdraw an action no worker has claimed yet.
    pub fn cancel(&self, id: &ActionId) -> Result<ActionState, CoreError> {
        Ok(self.inner.store.cancel(id)?.state())
    }

    pub fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<NetworkingAction>, CoreError> {
        self.inner.store.list_actions(filter)
    }

    /// Read the live channel assignments of `ports` from their switches.
    pub async fn get_port_networks(
        &self,
        ports: &[PortRef],
    ) -> Result<BTreeMap<PortRef, PortNetworks>, CoreError> {
        let mut by_switch: BTreeMap<&str, Vec<PortRef>> = BTreeMap::new();
        for port in ports {
            by_switch
                .entry(port.switch.as_str())
                .or_default()
                .push(port.clone());
        }

        let mut out = BTreeMap::new();
        for (switch, ports) in by_switch {
            let session = self.inner.registry.open(switch).await?;
            let result = session.get_port_networks(&ports).await;
            if let Err(e) = session.disconnect().await {
                warn!(switch, error = %e, "switch session did not close cleanly");
            }
            out.extend(result?);
        }
        Ok(out)
    }

    /// Poll until `id` reaches a terminal state or `deadline` passes, then
    /// return the latest state.
    pub async fn wait_for(
        &self,
        id: &ActionId,
        deadline: Duration,
    ) -> Result<ActionState, CoreError> {
        let started = tokio::time::Instant::now();
        loop {
            let state = self.get_status(id)?;
            if state.status.is_terminal() || started.elapsed() >= deadline {
                return Ok(state);
            }
            tokio::time::sleep(STATUS_POLL).await;
        }
    }

    // ── Worker lifecycle ─────────────────────────────────────────────

    /// Release claims a previous process left behind and spawn the
    /// configured number of workers. Calling it while workers are running
    /// is a no-op; after [`shutdown`](Self::shutdown) it starts a new set.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut running = self.inner.workers.lock().await;
        if !running.handles.is_empty() {
            return Ok(());
        }

        let released = self.inner.store.recover()?;
        if released > 0 {
            info!(released, "re-queued actions interrupted by a previous run");
        }

        running.cancel = CancellationToken::new();
        let workers = self.inner.config.workers.max(1);
        for index in 0..workers {
            let engine = self.clone();
            let cancel = running.cancel.child_token();
            running
                .handles
                .push(tokio::spawn(worker_task(engine, index, cancel)));
        }
        info!(workers, "action engine started");
        Ok(())
    }

    /// Stop the workers. Each finishes the action it is executing first.
    pub async fn shutdown(&self) {
        let mut running = self.inner.workers.lock().await;
        running.cancel.cancel();
        for handle in running.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }
        info!("action engine stopped");
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Claim and execute one action. Returns the resolved action, or
    /// `None` when nothing is runnable.
    pub async fn run_once(&self) -> Result<Option<NetworkingAction>, CoreError> {
        let Some(action) = self.inner.store.claim_next()? else {
            return Ok(None);
        };
        self.execute(action).await.map(Some)
    }

    /// Execute actions until none is runnable. Returns how many ran.
    pub async fn run_until_idle(&self) -> Result<usize, CoreError> {
        let mut ran = 0;
        while self.run_once().await?.is_some() {
            ran += 1;
        }
        Ok(ran)
    }

    async fn execute(&self, action: NetworkingAction) -> Result<NetworkingAction, CoreError> {
        let config = &self.inner.config;
        let max_attempts = config.max_attempts.max(1);
        info!(
            action_id = %action.id,
            port = %action.port,
            "executing {}",
            action.describe()
        );

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self.attempt(&action).await {
                Ok(()) => break Outcome::Done,
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = config.backoff_for(attempt);
                    warn!(
                        action_id = %action.id,
                        port = %action.port,
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient switch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        action_id = %action.id,
                        port = %action.port,
                        switch = %action.port.switch,
                        attempt,
                        error = %e,
                        "action failed"
                    );
                    break Outcome::Error(e.to_string());
                }
            }
        };

        let resolved = self.resolve(&action, outcome, attempt)?;
        info!(
            action_id = %resolved.id,
            port = %resolved.port,
            status = %resolved.status,
            attempts = resolved.attempts,
            "action resolved"
        );
        Ok(resolved)
    }

    /// Record `outcome`. If that fails the action is resolved to ERROR
    /// instead, and if even that fails its claim is released so the port
    /// is not held until the next recovery.
    fn resolve(
        &self,
        action: &NetworkingAction,
        outcome: Outcome,
        attempts: u32,
    ) -> Result<NetworkingAction, CoreError> {
        let store = &self.inner.store;
        let err = match store.complete(&action.id, outcome, attempts) {
            Ok(resolved) => return Ok(resolved),
            Err(e) => e,
        };
        error!(action_id = %action.id, error = %err, "could not record action outcome");

        let diagnostic = format!("outcome could not be recorded: {err}");
        if let Ok(resolved) = store.complete(&action.id, Outcome::Error(diagnostic), attempts) {
            return Ok(resolved);
        }
        if let Err(e) = store.release(&action.id) {
            error!(action_id = %action.id, error = %e, "could not release action claim");
        }
        Err(err)
    }

    /// One try: open a session, apply, always disconnect. Every switch
    /// interaction is bounded by the action timeout.
    async fn attempt(&self, action: &NetworkingAction) -> Result<(), CoreError> {
        let deadline = self.inner.config.action_timeout;
        let switch = self.inner.registry.get(&action.port.switch)?;

        let session = bounded(deadline, SwitchSession::open(switch.as_ref())).await?;
        let result = bounded(deadline, apply(&session, action)).await;
        if let Err(e) = bounded(deadline, session.disconnect()).await {
            warn!(
                action_id = %action.id,
                switch = %action.port.switch,
                error = %e,
                "switch session did not close cleanly"
            );
        }
        result
    }
}

async fn apply(session: &SwitchSession, action: &NetworkingAction) -> Result<(), CoreError> {
    let label = action.port.label.as_str();
    match &action.kind {
        ActionKind::ModifyPort { channel, vlan, .. } => {
            session.modify_port(label, *channel, *vlan).await
        }
        ActionKind::RevertPort => session.revert_port(label).await,
    }
}

async fn bounded<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::TransportTransient {
                message: format!("switch did not respond within {}ms", deadline.as_millis()),
            })
        })
}

/// Drain runnable actions, then sleep until woken, polled or cancelled.
async fn worker_task(engine: ActionEngine, index: usize, cancel: CancellationToken) {
    let poll = engine.inner.config.poll_interval;
    debug!(worker = index, "worker started");

    loop {
        while !cancel.is_cancelled() {
            match engine.run_once().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    error!(worker = index, error = %e, "could not process action queue");
                    break;
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = engine.inner.wake.notified() => {}
            () = tokio::time::sleep(poll) => {}
        }
    }
    debug!(worker = index, "worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use linkward_switch::MockSwitch;

    use super::*;
    use crate::allocator::PoolRange;
    use crate::model::ActionStatus;
    use crate::store::tables::NODES;

    fn engine() -> ActionEngine {
        let store = Store::in_memory(PoolRange::new(100, 200).unwrap()).unwrap();
        store
            .create_network("net1", None, Vec::new(), None)
            .unwrap();
        store.register_node("nodeA", None).unwrap();
        store
            .register_nic("nodeA", "nic0", "aa:bb:cc:00:00:01")
            .unwrap();
        store.register_port("sw0", "eth1").unwrap();
        store
            .connect_nic(&PortRef::new("sw0", "eth1"), "nodeA", "nic0")
            .unwrap();

        let registry = SwitchRegistry::new();
        registry.insert(Arc::new(MockSwitch::new("sw0")));
        ActionEngine::new(Arc::new(store), registry, EngineConfig::default())
    }

    #[tokio::test]
    async fn unrecordable_success_resolves_to_error() {
        let engine = engine();
        let id = engine
            .enqueue(&NicRef::new("nodeA", "nic0"), Some("net1"), "vlan/native")
            .unwrap();

        // The Nic's record turns unreadable after the request was accepted.
        let txn = engine.store().db().begin_write().unwrap();
        txn.open_table(NODES)
            .unwrap()
            .insert("nodeA", b"not json".as_slice())
            .unwrap();
        txn.commit().unwrap();

        let resolved = engine.run_once().await.unwrap().unwrap();
        assert_eq!(resolved.id, id);
        assert_eq!(resolved.status, ActionStatus::Error);
        assert!(
            resolved
                .diagnostic
                .as_deref()
                .is_some_and(|d| d.contains("could not be recorded"))
        );
        assert_eq!(engine.store().pending_count().unwrap(), 0);
        assert!(engine.run_once().await.unwrap().is_none());
    }
}
