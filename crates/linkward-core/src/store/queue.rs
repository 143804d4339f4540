// ── Action queue ──
//
// Unfinished actions live in `action_queue`, keyed by creation sequence.
// A port's head is its lowest-sequence entry. Claiming picks the first
// unclaimed head in sequence order, so an action is never claimed while an
// older action on the same port is still in flight, and claims on
// different ports proceed independently. Claim and completion each run in
// a single write transaction.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::tables::{ACTION_QUEUE, ACTION_SEQUENCE, ACTIONS, META, NETWORKS, NODES, PORTS};
use super::{Store, decode, encode, get_json, put_json, scan_json};
use crate::allocator::channel_is_legal;
use crate::error::CoreError;
use crate::model::{
    ActionId, ActionKind, ActionStatus, Channel, Network, NetworkingAction, NicRef, Node, Port,
    PortRef,
};

/// Diagnostic recorded on actions withdrawn by [`Store::cancel`].
pub const WITHDRAWN: &str = "withdrawn before execution";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QueueEntry {
    pub(crate) action: ActionId,
    /// [`PortRef::key`] of the target port.
    pub(crate) port: String,
    #[serde(default)]
    pub(crate) claimed: bool,
}

/// How an executed action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Error(String),
}

/// Selection for [`Store::list_actions`].
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub status: Option<ActionStatus>,
    pub port: Option<PortRef>,
}

impl ActionFilter {
    fn matches(&self, action: &NetworkingAction) -> bool {
        self.status.is_none_or(|s| s == action.status)
            && self.port.as_ref().is_none_or(|p| *p == action.port)
    }
}

impl Store {
    // ── Enqueue ──────────────────────────────────────────────────────

    /// Validate and record a connect (`network` set) or detach request for
    /// `nic` on `channel`. A connect is checked against the Nic's
    /// attachments as they will be once its queued actions have run.
    /// Nothing is written when validation fails.
    pub fn enqueue_modify(
        &self,
        nic: &NicRef,
        network: Option<&str>,
        channel: Channel,
    ) -> Result<NetworkingAction, CoreError> {
        let txn = self.db.begin_write()?;
        let action = {
            let node: Node = get_json(&txn.open_table(NODES)?, "nodes", &nic.node)?
                .ok_or_else(|| CoreError::not_found("node", nic.node.clone()))?;
            let target = node
                .nics
                .get(&nic.nic)
                .ok_or_else(|| CoreError::not_found("nic", nic.to_string()))?;
            let port = target.port.clone().ok_or_else(|| {
                CoreError::validation(format!("nic {nic} is not wired to a switch port"))
            })?;

            let vlan = match network {
                Some(name) => {
                    let net: Network = get_json(&txn.open_table(NETWORKS)?, "networks", name)?
                        .ok_or_else(|| CoreError::not_found("network", name))?;
                    let attachments = projected_attachments(&txn, nic, &target.attachments)?;
                    check_connect(&node, &attachments, &net, channel)?;
                    Some(net.network_id)
                }
                None => None,
            };

            let kind = ActionKind::ModifyPort {
                channel,
                network: network.map(str::to_owned),
                vlan,
            };
            insert_action(&txn, kind, nic.clone(), port)?
        };
        txn.commit()?;

        info!(
            action_id = %action.id,
            port = %action.port,
            nic = %action.nic,
            channel = %channel,
            "queued {}",
            action.describe()
        );
        Ok(action)
    }

    /// Record a full reset of `port`. The port must be wired to a Nic,
    /// whose attachments are cleared once the reset succeeds.
    pub fn enqueue_revert(&self, port: &PortRef) -> Result<NetworkingAction, CoreError> {
        let key = port.key();
        let txn = self.db.begin_write()?;
        let action = {
            let record: Port = get_json(&txn.open_table(PORTS)?, "ports", &key)?
                .ok_or_else(|| CoreError::not_found("port", key.clone()))?;
            let nic = record.nic.ok_or_else(|| {
                CoreError::validation(format!("port {port} is not wired to a nic"))
            })?;
            insert_action(&txn, ActionKind::RevertPort, nic, port.clone())?
        };
        txn.commit()?;

        info!(action_id = %action.id, port = %action.port, "queued revert port");
        Ok(action)
    }

    // ── Claim / complete ─────────────────────────────────────────────

    /// Atomically claim the oldest action whose port has nothing in
    /// flight. Returns `None` when no action is claimable.
    pub fn claim_next(&self) -> Result<Option<NetworkingAction>, CoreError> {
        self.claim(None)
    }

    /// Atomically claim the head action for `port`, if it is unclaimed.
    pub fn claim_next_for_port(
        &self,
        port: &PortRef,
    ) -> Result<Option<NetworkingAction>, CoreError> {
        self.claim(Some(&port.key()))
    }

    fn claim(&self, only_port: Option<&str>) -> Result<Option<NetworkingAction>, CoreError> {
        let txn = self.db.begin_write()?;
        let claimed = {
            let mut queue = txn.open_table(ACTION_QUEUE)?;
            let mut seen: HashSet<String> = HashSet::new();
            let mut pick = None;

            for item in queue.iter()? {
                let (seq, raw) = item?;
                let entry: QueueEntry = decode("action_queue", raw.value())?;
                if only_port.is_some_and(|p| p != entry.port) {
                    continue;
                }
                if !seen.insert(entry.port.clone()) {
                    continue;
                }
                if !entry.claimed {
                    pick = Some((seq.value(), entry));
                    break;
                }
                if only_port.is_some() {
                    break;
                }
            }

            match pick {
                None => None,
                Some((seq, mut entry)) => {
                    entry.claimed = true;
                    let bytes = encode("action_queue", &entry)?;
                    queue.insert(seq, bytes.as_slice())?;

                    let mut actions = txn.open_table(ACTIONS)?;
                    let key = entry.action.to_string();
                    let mut action: NetworkingAction = get_json(&actions, "actions", &key)?
                        .ok_or_else(|| CoreError::Corrupt {
                            table: "action_queue",
                            message: format!("queued action {key} has no record"),
                        })?;
                    action.claimed_at = Some(Utc::now());
                    put_json(&mut actions, "actions", &key, &action)?;
                    Some(action)
                }
            }
        };
        txn.commit()?;

        if let Some(action) = &claimed {
            debug!(action_id = %action.id, port = %action.port, "claimed action");
        }
        Ok(claimed)
    }

    /// Resolve a claimed action. On success the Nic's channel mapping is
    /// updated in the same transaction that marks the action DONE.
    pub fn complete(
        &self,
        id: &ActionId,
        outcome: Outcome,
        attempts: u32,
    ) -> Result<NetworkingAction, CoreError> {
        let key = id.to_string();
        let txn = self.db.begin_write()?;
        let action = {
            let mut actions = txn.open_table(ACTIONS)?;
            let mut action: NetworkingAction = get_json(&actions, "actions", &key)?
                .ok_or_else(|| CoreError::not_found("action", key.clone()))?;
            if action.status.is_terminal() {
                return Err(CoreError::conflict(
                    "action",
                    key,
                    format!("already {}", action.status),
                ));
            }

            match outcome {
                Outcome::Done => {
                    apply_to_nic(&txn, &action)?;
                    action.status = ActionStatus::Done;
                    action.diagnostic = None;
                }
                Outcome::Error(diagnostic) => {
                    action.status = ActionStatus::Error;
                    action.diagnostic = Some(diagnostic);
                }
            }
            action.attempts = attempts;
            action.finished_at = Some(Utc::now());
            put_json(&mut actions, "actions", &key, &action)?;
            txn.open_table(ACTION_QUEUE)?.remove(action.sequence)?;
            action
        };
        txn.commit()?;
        Ok(action)
    }

    /// Withdraw an action no worker has claimed yet. It becomes ERROR with
    /// the [`WITHDRAWN`] diagnostic.
    pub fn cancel(&self, id: &ActionId) -> Result<NetworkingAction, CoreError> {
        let key = id.to_string();
        let txn = self.db.begin_write()?;
        let action = {
            let mut actions = txn.open_table(ACTIONS)?;
            let mut queue = txn.open_table(ACTION_QUEUE)?;
            let mut action: NetworkingAction = get_json(&actions, "actions", &key)?
                .ok_or_else(|| CoreError::not_found("action", key.clone()))?;

            if action.status.is_terminal() {
                return Err(CoreError::CancelRejected {
                    action_id: key,
                    reason: format!("already {}", action.status),
                });
            }
            let claimed = match queue.get(action.sequence)? {
                Some(raw) => decode::<QueueEntry>("action_queue", raw.value())?.claimed,
                None => true,
            };
            if claimed {
                return Err(CoreError::CancelRejected {
                    action_id: key,
                    reason: "already being executed".into(),
                });
            }

            queue.remove(action.sequence)?;
            action.status = ActionStatus::Error;
            action.diagnostic = Some(WITHDRAWN.to_owned());
            action.finished_at = Some(Utc::now());
            put_json(&mut actions, "actions", &key, &action)?;
            action
        };
        txn.commit()?;

        info!(action_id = %id, port = %action.port, "cancelled action");
        Ok(action)
    }

    /// Give up the claim on `id` without resolving it, so the action runs
    /// again. Does nothing once the action has left the queue.
    pub fn release(&self, id: &ActionId) -> Result<(), CoreError> {
        let key = id.to_string();
        let txn = self.db.begin_write()?;
        {
            let mut actions = txn.open_table(ACTIONS)?;
            let mut queue = txn.open_table(ACTION_QUEUE)?;
            let mut action: NetworkingAction = get_json(&actions, "actions", &key)?
                .ok_or_else(|| CoreError::not_found("action", key.clone()))?;
            let Some(mut entry) = queue
                .get(action.sequence)?
                .map(|raw| decode::<QueueEntry>("action_queue", raw.value()))
                .transpose()?
            else {
                return Ok(());
            };

            entry.claimed = false;
            let bytes = encode("action_queue", &entry)?;
            queue.insert(action.sequence, bytes.as_slice())?;
            action.claimed_at = None;
            put_json(&mut actions, "actions", &key, &action)?;
        }
        txn.commit()?;
        warn!(action_id = %id, "released claim without resolving the action");
        Ok(())
    }

    /// Release claims left by a process that stopped mid-action so the
    /// actions run again. Returns how many were released.
    pub fn recover(&self) -> Result<usize, CoreError> {
        let txn = self.db.begin_write()?;
        let released = {
            let mut queue = txn.open_table(ACTION_QUEUE)?;
            let mut actions = txn.open_table(ACTIONS)?;

            let mut stale: Vec<(u64, QueueEntry)> = Vec::new();
            for item in queue.iter()? {
                let (seq, raw) = item?;
                let entry: QueueEntry = decode("action_queue", raw.value())?;
                if entry.claimed {
                    stale.push((seq.value(), entry));
                }
            }

            for (seq, entry) in &mut stale {
                entry.claimed = false;
                let bytes = encode("action_queue", &*entry)?;
                queue.insert(*seq, bytes.as_slice())?;

                let key = entry.action.to_string();
                if let Some(mut action) =
                    get_json::<NetworkingAction, _>(&actions, "actions", &key)?
                {
                    action.claimed_at = None;
                    put_json(&mut actions, "actions", &key, &action)?;
                }
                warn!(action_id = %entry.action, port = %entry.port, "released stale claim");
            }
            stale.len()
        };
        txn.commit()?;
        Ok(released)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_action(&self, id: &ActionId) -> Result<NetworkingAction, CoreError> {
        let key = id.to_string();
        let txn = self.db.begin_read()?;
        get_json(&txn.open_table(ACTIONS)?, "actions", &key)?
            .ok_or_else(|| CoreError::not_found("action", key))
    }

    /// Actions matching `filter`, oldest first.
    pub fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<NetworkingAction>, CoreError> {
        let txn = self.db.begin_read()?;
        let mut actions: Vec<NetworkingAction> = scan_json(&txn.open_table(ACTIONS)?, "actions")?;
        actions.retain(|a| filter.matches(a));
        actions.sort_by_key(|a| a.sequence);
        Ok(actions)
    }

    /// Number of actions not yet resolved.
    pub fn pending_count(&self) -> Result<usize, CoreError> {
        let txn = self.db.begin_read()?;
        let queue = txn.open_table(ACTION_QUEUE)?;
        let mut count = 0;
        for item in queue.iter()? {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

fn check_connect(
    node: &Node,
    attachments: &BTreeMap<Channel, String>,
    network: &Network,
    channel: Channel,
) -> Result<(), CoreError> {
    if !channel_is_legal(channel, network.network_id) {
        return Err(CoreError::validation(format!(
            "channel {channel} is not legal for network '{}' (id {})",
            network.name, network.network_id
        )));
    }
    if let Some(project) = &node.project {
        if !network.grants(project) {
            return Err(CoreError::validation(format!(
                "project '{project}' has no access to network '{}'",
                network.name
            )));
        }
    }
    if let Some(current) = attachments
        .iter()
        .find(|(c, n)| **n == network.name && **c != channel)
        .map(|(c, _)| *c)
    {
        return Err(CoreError::validation(format!(
            "network '{}' is already attached on {current}",
            network.name
        )));
    }
    if let Some(other) = attachments.get(&channel).filter(|n| **n != network.name) {
        return Err(CoreError::validation(format!(
            "channel {channel} is already in use by network '{other}'"
        )));
    }
    Ok(())
}

/// `current` with every unfinished action on `nic` applied in queue order.
fn projected_attachments(
    txn: &WriteTransaction,
    nic: &NicRef,
    current: &BTreeMap<Channel, String>,
) -> Result<BTreeMap<Channel, String>, CoreError> {
    let mut projected = current.clone();
    let queue = txn.open_table(ACTION_QUEUE)?;
    let actions = txn.open_table(ACTIONS)?;
    for item in queue.iter()? {
        let (_, raw) = item?;
        let entry: QueueEntry = decode("action_queue", raw.value())?;
        let Some(action) =
            get_json::<NetworkingAction, _>(&actions, "actions", &entry.action.to_string())?
        else {
            continue;
        };
        if action.nic != *nic {
            continue;
        }
        match action.kind {
            ActionKind::ModifyPort {
                channel,
                network: Some(network),
                ..
            } => {
                projected.insert(channel, network);
            }
            ActionKind::ModifyPort {
                channel,
                network: None,
                ..
            } => {
                projected.remove(&channel);
            }
            ActionKind::RevertPort => projected.clear(),
        }
    }
    Ok(projected)
}

fn insert_action(
    txn: &WriteTransaction,
    kind: ActionKind,
    nic: NicRef,
    port: PortRef,
) -> Result<NetworkingAction, CoreError> {
    let sequence = {
        let mut meta = txn.open_table(META)?;
        let next = meta
            .get(ACTION_SEQUENCE)?
            .map_or(0, |v| v.value())
            .saturating_add(1);
        meta.insert(ACTION_SEQUENCE, next)?;
        next
    };

    let action = NetworkingAction {
        id: ActionId::new(),
        kind,
        nic,
        port,
        status: ActionStatus::Pending,
        diagnostic: None,
        sequence,
        created_at: Utc::now(),
        claimed_at: None,
        finished_at: None,
        attempts: 0,
    };
    let key = action.id.to_string();

    let mut actions = txn.open_table(ACTIONS)?;
    put_json(&mut actions, "actions", &key, &action)?;

    let entry = QueueEntry {
        action: action.id,
        port: action.port.key(),
        claimed: false,
    };
    let bytes = encode("action_queue", &entry)?;
    txn.open_table(ACTION_QUEUE)?
        .insert(sequence, bytes.as_slice())?;
    Ok(action)
}

/// Record the confirmed switch state on the action's Nic.
fn apply_to_nic(txn: &WriteTransaction, action: &NetworkingAction) -> Result<(), CoreError> {
    let mut nodes = txn.open_table(NODES)?;
    let Some(mut node) = get_json::<Node, _>(&nodes, "nodes", &action.nic.node)? else {
        warn!(action_id = %action.id, nic = %action.nic, "nic vanished before completion");
        return Ok(());
    };
    let Some(nic) = node.nics.get_mut(&action.nic.nic) else {
        warn!(action_id = %action.id, nic = %action.nic, "nic vanished before completion");
        return Ok(());
    };

    match &action.kind {
        ActionKind::ModifyPort {
            channel,
            network: Some(network),
            ..
        } => {
            nic.attachments.insert(*channel, network.clone());
        }
        ActionKind::ModifyPort {
            channel,
            network: None,
            ..
        } => {
            nic.attachments.remove(channel);
        }
        ActionKind::RevertPort => nic.attachments.clear(),
    }
    put_json(&mut nodes, "nodes", &action.nic.node, &node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::allocator::PoolRange;

    struct Fixture {
        store: Store,
        nic: NicRef,
        port: PortRef,
    }

    fn fixture() -> Fixture {
        let store = Store::in_memory(PoolRange::new(100, 200).unwrap()).unwrap();
        store
            .create_network("net1", Some("proj1"), Vec::new(), None)
            .unwrap();
        store.register_node("nodeA", Some("proj1")).unwrap();
        store
            .register_nic("nodeA", "nic0", "aa:bb:cc:dd:ee:01")
            .unwrap();
        store.register_port("sw0", "eth1").unwrap();
        let port = PortRef::new("sw0", "eth1");
        store.connect_nic(&port, "nodeA", "nic0").unwrap();
        Fixture {
            store,
            nic: NicRef::new("nodeA", "nic0"),
            port,
        }
    }

    #[test]
    fn illegal_channel_is_rejected_without_a_record() {
        let f = fixture();
        let err = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(101))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(f.store.pending_count().unwrap(), 0);
        assert!(f.store.list_actions(&ActionFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn project_without_access_is_rejected() {
        let f = fixture();
        f.store
            .create_network("private", Some("proj2"), Vec::new(), None)
            .unwrap();
        let err = f
            .store
            .enqueue_modify(&f.nic, Some("private"), Channel::Native)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn unwired_nic_is_rejected() {
        let f = fixture();
        f.store
            .register_nic("nodeA", "nic1", "aa:bb:cc:dd:ee:02")
            .unwrap();
        let err = f
            .store
            .enqueue_modify(&NicRef::new("nodeA", "nic1"), None, Channel::Native)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn one_claim_per_port_at_a_time() {
        let f = fixture();
        f.store.register_port("sw0", "eth2").unwrap();
        f.store.register_node("nodeB", Some("proj1")).unwrap();
        f.store
            .register_nic("nodeB", "nic0", "aa:bb:cc:dd:ee:03")
            .unwrap();
        let other = PortRef::new("sw0", "eth2");
        f.store.connect_nic(&other, "nodeB", "nic0").unwrap();

        let first = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap();
        let second = f
            .store
            .enqueue_modify(&f.nic, None, Channel::Tagged(100))
            .unwrap();
        let third = f
            .store
            .enqueue_modify(&NicRef::new("nodeB", "nic0"), Some("net1"), Channel::Native)
            .unwrap();

        let a = f.store.claim_next().unwrap().unwrap();
        assert_eq!(a.id, first.id);
        // `second` waits behind `first`; the other port is free to go.
        let b = f.store.claim_next().unwrap().unwrap();
        assert_eq!(b.id, third.id);
        assert!(f.store.claim_next().unwrap().is_none());
        assert!(f.store.claim_next_for_port(&f.port).unwrap().is_none());

        f.store.complete(&first.id, Outcome::Done, 1).unwrap();
        let c = f.store.claim_next_for_port(&f.port).unwrap().unwrap();
        assert_eq!(c.id, second.id);
    }

    #[test]
    fn completion_updates_nic_only_on_success() {
        let f = fixture();
        let connect = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap();
        f.store.claim_next().unwrap().unwrap();
        let failed = f
            .store
            .complete(&connect.id, Outcome::Error("switch said no".into()), 1)
            .unwrap();
        assert_eq!(failed.status, ActionStatus::Error);
        assert_eq!(failed.diagnostic.as_deref(), Some("switch said no"));
        assert!(f.store.get_node("nodeA").unwrap().nics["nic0"].attachments.is_empty());

        let retry = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap();
        f.store.claim_next().unwrap().unwrap();
        f.store.complete(&retry.id, Outcome::Done, 2).unwrap();
        let node = f.store.get_node("nodeA").unwrap();
        assert_eq!(
            node.nics["nic0"]
                .attachments
                .get(&Channel::Tagged(100))
                .map(String::as_str),
            Some("net1")
        );

        // Terminal states are final.
        assert!(f.store.complete(&retry.id, Outcome::Error("late".into()), 3).is_err());
        assert_eq!(
            f.store.get_action(&retry.id).unwrap().status,
            ActionStatus::Done
        );
    }

    #[test]
    fn revert_clears_every_attachment() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        f.store.claim_next().unwrap().unwrap();
        f.store.complete(&a.id, Outcome::Done, 1).unwrap();
        assert_eq!(f.store.get_node("nodeA").unwrap().nics["nic0"].attachments.len(), 1);

        let revert = f.store.enqueue_revert(&f.port).unwrap();
        f.store.claim_next().unwrap().unwrap();
        f.store.complete(&revert.id, Outcome::Done, 1).unwrap();
        assert!(f.store.get_node("nodeA").unwrap().nics["nic0"].attachments.is_empty());
    }

    #[test]
    fn cancel_only_before_claim() {
        let f = fixture();
        let first = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        let second = f.store.enqueue_modify(&f.nic, None, Channel::Native).unwrap();

        f.store.claim_next().unwrap().unwrap();
        assert!(matches!(
            f.store.cancel(&first.id),
            Err(CoreError::CancelRejected { .. })
        ));

        let withdrawn = f.store.cancel(&second.id).unwrap();
        assert_eq!(withdrawn.status, ActionStatus::Error);
        assert_eq!(withdrawn.diagnostic.as_deref(), Some(WITHDRAWN));
        assert!(matches!(
            f.store.cancel(&second.id),
            Err(CoreError::CancelRejected { .. })
        ));
        assert_eq!(f.store.pending_count().unwrap(), 1);
    }

    #[test]
    fn recover_releases_stale_claims() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        f.store.claim_next().unwrap().unwrap();
        assert!(f.store.claim_next().unwrap().is_none());

        assert_eq!(f.store.recover().unwrap(), 1);
        let again = f.store.claim_next().unwrap().unwrap();
        assert_eq!(again.id, a.id);
    }

    #[test]
    fn released_claim_can_be_claimed_again() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        f.store.claim_next().unwrap().unwrap();
        assert!(f.store.claim_next_for_port(&f.port).unwrap().is_none());

        f.store.release(&a.id).unwrap();
        assert!(!f.store.get_action(&a.id).unwrap().is_claimed());
        assert_eq!(f.store.claim_next().unwrap().unwrap().id, a.id);

        f.store.complete(&a.id, Outcome::Done, 1).unwrap();
        f.store.release(&a.id).unwrap();
        assert_eq!(f.store.get_action(&a.id).unwrap().status, ActionStatus::Done);
    }

    #[test]
    fn queued_actions_count_toward_connect_checks() {
        let f = fixture();
        f.store
            .create_network("net2", Some("proj1"), Vec::new(), None)
            .unwrap();
        f.store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();

        // net1 is already headed for the native channel.
        let err = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }), "{err:?}");
        let err = f
            .store
            .enqueue_modify(&f.nic, Some("net2"), Channel::Native)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }), "{err:?}");
        assert_eq!(f.store.pending_count().unwrap(), 1);

        // A queued detach frees the channel for what follows it.
        f.store.enqueue_modify(&f.nic, None, Channel::Native).unwrap();
        f.store
            .enqueue_modify(&f.nic, Some("net2"), Channel::Native)
            .unwrap();
        f.store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap();
        assert_eq!(f.store.pending_count().unwrap(), 4);
    }

    #[test]
    fn withdrawn_connect_no_longer_blocks() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        f.store.cancel(&a.id).unwrap();
        f.store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Tagged(100))
            .unwrap();
    }

    #[test]
    fn list_actions_filters_by_status() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        let b = f.store.enqueue_modify(&f.nic, None, Channel::Native).unwrap();
        f.store.claim_next().unwrap().unwrap();
        f.store.complete(&a.id, Outcome::Done, 1).unwrap();

        let pending = f
            .store
            .list_actions(&ActionFilter {
                status: Some(ActionStatus::Pending),
                port: None,
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        let all = f.store.list_actions(&ActionFilter::default()).unwrap();
        assert_eq!(
            all.iter().map(|x| x.sequence).collect::<Vec<_>>(),
            vec![a.sequence, b.sequence]
        );
    }

    #[test]
    fn network_with_pending_action_cannot_be_deleted() {
        let f = fixture();
        let a = f
            .store
            .enqueue_modify(&f.nic, Some("net1"), Channel::Native)
            .unwrap();
        assert!(matches!(
            f.store.delete_network("net1"),
            Err(CoreError::Conflict { .. })
        ));
        f.store.cancel(&a.id).unwrap();
        f.store.delete_network("net1").unwrap();
    }
}
