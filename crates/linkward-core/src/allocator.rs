// ── Network allocator ──
//
// Owns the VLAN id pool and decides which channels a network may use.
//
// The pool is two durable sets, free and allocated. Allocation pops the
// lowest key of the free set inside a write transaction; redb admits one
// writer at a time, so two concurrent callers can never observe the same
// free id. Legality checks are pure functions of the channel and the
// network's id.

use std::fmt;

use linkward_switch::{MAX_VLAN_ID, MIN_VLAN_ID, VlanId, is_valid_vlan_id};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::Channel;
use crate::store::tables::{VLAN_ALLOCATED, VLAN_FREE};

// ── Legality ─────────────────────────────────────────────────────────

/// Whether `channel` may carry the network whose VLAN id is `network_id`.
///
/// `vlan/native` is legal for any valid id; `vlan/<n>` only when
/// `n == network_id`. Malformed channel strings are never legal.
pub fn is_legal_channel_for(channel: &str, network_id: VlanId) -> bool {
    channel
        .parse::<Channel>()
        .is_ok_and(|c| channel_is_legal(c, network_id))
}

/// Typed form of [`is_legal_channel_for`].
pub fn channel_is_legal(channel: Channel, network_id: VlanId) -> bool {
    if !is_valid_vlan_id(network_id) {
        return false;
    }
    match channel {
        Channel::Native => true,
        Channel::Tagged(n) => n == network_id,
    }
}

/// Every channel a network with `network_id` may be attached on.
pub fn legal_channels_for(network_id: VlanId) -> Vec<Channel> {
    vec![Channel::Native, Channel::Tagged(network_id)]
}

/// Channel used when a caller does not name one.
pub fn default_channel() -> Channel {
    Channel::Native
}

/// Whether an administrator-supplied network id is usable at all.
pub fn validate_network_id(id: VlanId) -> bool {
    is_valid_vlan_id(id)
}

// ── Pool ─────────────────────────────────────────────────────────────

/// Half-open range of VLAN ids the allocator hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRange {
    pub start: VlanId,
    pub end: VlanId,
}

impl PoolRange {
    pub fn new(start: VlanId, end: VlanId) -> Result<Self, CoreError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.start >= self.end {
            return Err(CoreError::Config {
                message: format!("VLAN pool {self} is empty"),
            });
        }
        if self.start < MIN_VLAN_ID || self.end > MAX_VLAN_ID + 1 {
            return Err(CoreError::Config {
                message: format!("VLAN pool {self} exceeds {MIN_VLAN_ID}..={MAX_VLAN_ID}"),
            });
        }
        Ok(())
    }

    pub fn contains(&self, id: VlanId) -> bool {
        (self.start..self.end).contains(&id)
    }

    pub fn len(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for PoolRange {
    fn default() -> Self {
        Self {
            start: 100,
            end: 200,
        }
    }
}

impl fmt::Display for PoolRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Transaction-scoped operations on the durable VLAN pool.
#[derive(Debug, Clone, Copy)]
pub struct VlanPool {
    range: PoolRange,
}

impl VlanPool {
    pub fn new(range: PoolRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> PoolRange {
        self.range
    }

    /// Seed the free set with every in-range id that is not allocated and
    /// drop free ids that fell out of the range. Allocated ids are kept
    /// until freed, wherever they are.
    pub(crate) fn populate(&self, txn: &WriteTransaction) -> Result<usize, CoreError> {
        let allocated = txn.open_table(VLAN_ALLOCATED)?;
        let mut free = txn.open_table(VLAN_FREE)?;

        let stale: Vec<VlanId> = free
            .iter()?
            .map(|entry| entry.map(|(k, _)| k.value()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|id| !self.range.contains(*id))
            .collect();
        for id in stale {
            free.remove(id)?;
        }

        let mut added = 0;
        for id in self.range.start..self.range.end {
            if allocated.get(id)?.is_none() && free.get(id)?.is_none() {
                free.insert(id, ())?;
                added += 1;
            }
        }
        debug!(range = %self.range, added, "populated VLAN pool");
        Ok(added)
    }

    /// Claim the lowest free id.
    pub(crate) fn allocate(&self, txn: &WriteTransaction) -> Result<VlanId, CoreError> {
        let mut free = txn.open_table(VLAN_FREE)?;
        let Some(id) = free.pop_first()?.map(|(k, _)| k.value()) else {
            return Err(CoreError::AllocationExhausted {
                start: self.range.start,
                end: self.range.end,
            });
        };
        drop(free);
        txn.open_table(VLAN_ALLOCATED)?.insert(id, ())?;
        Ok(id)
    }

    /// Return `id` to the pool. Returns `false` if it was not allocated.
    pub(crate) fn free(&self, txn: &WriteTransaction, id: VlanId) -> Result<bool, CoreError> {
        let was_allocated = txn.open_table(VLAN_ALLOCATED)?.remove(id)?.is_some();
        if was_allocated && self.range.contains(id) {
            txn.open_table(VLAN_FREE)?.insert(id, ())?;
        }
        Ok(was_allocated)
    }

    /// Reserve an administrator-supplied id.
    ///
    /// Ids outside the pool are accepted without touching it. Returns
    /// `true` if the id was taken from the pool.
    pub(crate) fn claim(&self, txn: &WriteTransaction, id: VlanId) -> Result<bool, CoreError> {
        if !validate_network_id(id) {
            return Err(CoreError::validation(format!(
                "network id {id} is outside {MIN_VLAN_ID}..={MAX_VLAN_ID}"
            )));
        }
        if !self.range.contains(id) {
            return Ok(false);
        }
        let removed = txn.open_table(VLAN_FREE)?.remove(id)?.is_some();
        if !removed {
            return Err(CoreError::conflict(
                "network id",
                id.to_string(),
                "already in use",
            ));
        }
        txn.open_table(VLAN_ALLOCATED)?.insert(id, ())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_channel_legal_only_for_its_own_id() {
        for n in [1, 100, 1234, 4093] {
            assert!(is_legal_channel_for(&format!("vlan/{n}"), n));
            assert!(!is_legal_channel_for(&format!("vlan/{}", n + 1), n));
        }
    }

    #[test]
    fn native_channel_legal_for_any_valid_id() {
        assert!(is_legal_channel_for("vlan/native", 1));
        assert!(is_legal_channel_for("vlan/native", 4094));
        assert!(!is_legal_channel_for("vlan/native", 0));
    }

    #[test]
    fn malformed_channel_is_never_legal() {
        assert!(!is_legal_channel_for("vlan/abc", 100));
        assert!(!is_legal_channel_for("native", 100));
    }

    #[test]
    fn legal_channels_and_default() {
        assert_eq!(
            legal_channels_for(42),
            vec![Channel::Native, Channel::Tagged(42)]
        );
        assert_eq!(default_channel(), Channel::Native);
    }

    #[test]
    fn pool_range_validation() {
        assert!(PoolRange::new(100, 200).is_ok());
        assert!(PoolRange::new(200, 100).is_err());
        assert!(PoolRange::new(100, 100).is_err());
        assert!(PoolRange::new(0, 10).is_err());
        assert!(PoolRange::new(4000, 4095).is_ok());
        assert!(PoolRange::new(4000, 4096).is_err());
        assert_eq!(PoolRange::default().len(), 100);
    }
}
