// ── Durable store ──
//
// One redb database holds the inventory (networks, nodes, ports), the
// networking action queue and the VLAN pool. Every operation that touches
// more than one record runs in a single write transaction; redb serializes
// writers, which is what makes claims and allocations atomic.

mod inventory;
mod queue;
pub(crate) mod tables;

use std::path::Path;

use linkward_switch::VlanId;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, ReadableTableMetadata, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::allocator::{PoolRange, VlanPool};
use crate::error::CoreError;
use tables::{
    ACTION_QUEUE, ACTIONS, META, NETWORKS, NODES, PORTS, VLAN_ALLOCATED, VLAN_FREE,
};

pub use queue::{ActionFilter, Outcome, WITHDRAWN};

/// Durable state shared by the request path and the workers.
pub struct Store {
    db: Database,
    pool: VlanPool,
}

impl Store {
    /// Open (or create) a file-backed store and reconcile the VLAN pool
    /// with `range`.
    pub fn open(path: impl AsRef<Path>, range: PoolRange) -> Result<Self, CoreError> {
        range.validate()?;
        let db = Database::create(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened store");
        Self::init(db, range)
    }

    /// A store that lives only as long as the process.
    pub fn in_memory(range: PoolRange) -> Result<Self, CoreError> {
        range.validate()?;
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db, range)
    }

    fn init(db: Database, range: PoolRange) -> Result<Self, CoreError> {
        let pool = VlanPool::new(range);
        let txn = db.begin_write()?;
        {
            // Creates any missing table so read transactions never fail on them.
            txn.open_table(NETWORKS)?;
            txn.open_table(NODES)?;
            txn.open_table(PORTS)?;
            txn.open_table(ACTIONS)?;
            txn.open_table(ACTION_QUEUE)?;
            txn.open_table(VLAN_FREE)?;
            txn.open_table(VLAN_ALLOCATED)?;
            txn.open_table(META)?;
        }
        pool.populate(&txn)?;
        txn.commit()?;
        Ok(Self { db, pool })
    }

    #[cfg(test)]
    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    // ── Allocator ───────────────────────────────────────────────────

    /// The configured pool range.
    pub fn pool_range(&self) -> PoolRange {
        self.pool.range()
    }

    /// Hand out the lowest unused VLAN id.
    pub fn allocate_id(&self) -> Result<VlanId, CoreError> {
        let txn = self.db.begin_write()?;
        let id = self.pool.allocate(&txn)?;
        txn.commit()?;
        Ok(id)
    }

    /// Return `id` to the pool. Returns `false` (and changes nothing) if
    /// the id was not allocated.
    pub fn free_id(&self, id: VlanId) -> Result<bool, CoreError> {
        let txn = self.db.begin_write()?;
        let freed = self.pool.free(&txn, id)?;
        txn.commit()?;
        Ok(freed)
    }

    /// Number of ids still available.
    pub fn free_count(&self) -> Result<u64, CoreError> {
        let txn = self.db.begin_read()?;
        Ok(txn.open_table(VLAN_FREE)?.len()?)
    }

    pub fn is_allocated(&self, id: VlanId) -> Result<bool, CoreError> {
        let txn = self.db.begin_read()?;
        Ok(txn.open_table(VLAN_ALLOCATED)?.get(id)?.is_some())
    }
}

// ── JSON record helpers ──────────────────────────────────────────────

pub(crate) fn get_json<T, R>(table: &R, name: &'static str, key: &str) -> Result<Option<T>, CoreError>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let Some(raw) = table.get(key)? else {
        return Ok(None);
    };
    decode(name, raw.value()).map(Some)
}

pub(crate) fn scan_json<T, R>(table: &R, name: &'static str) -> Result<Vec<T>, CoreError>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, raw) = entry?;
        out.push(decode(name, raw.value())?);
    }
    Ok(out)
}

pub(crate) fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    name: &'static str,
    key: &str,
    value: &T,
) -> Result<(), CoreError> {
    let bytes = encode(name, value)?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

pub(crate) fn decode<T: DeserializeOwned>(name: &'static str, raw: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(raw).map_err(|e| CoreError::Corrupt {
        table: name,
        message: e.to_string(),
    })
}

pub(crate) fn encode<T: Serialize>(name: &'static str, value: &T) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(value).map_err(|e| CoreError::Corrupt {
        table: name,
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn store(start: VlanId, end: VlanId) -> Store {
        Store::in_memory(PoolRange::new(start, end).unwrap()).unwrap()
    }

    #[test]
    fn allocates_lowest_first() {
        let store = store(100, 200);
        assert_eq!(store.allocate_id().unwrap(), 100);
        assert_eq!(store.allocate_id().unwrap(), 101);
        assert!(store.free_id(100).unwrap());
        assert_eq!(store.allocate_id().unwrap(), 100);
    }

    #[test]
    fn exhausts_after_pool_size_allocations() {
        let store = store(10, 15);
        let ids: HashSet<VlanId> = (0..5).map(|_| store.allocate_id().unwrap()).collect();
        assert_eq!(ids.len(), 5);
        assert!(matches!(
            store.allocate_id(),
            Err(CoreError::AllocationExhausted { start: 10, end: 15 })
        ));
    }

    #[test]
    fn freeing_unallocated_id_is_noop() {
        let store = store(10, 15);
        assert!(!store.free_id(12).unwrap());
        assert!(!store.free_id(3000).unwrap());
        assert_eq!(store.free_count().unwrap(), 5);
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let store = Arc::new(store(100, 164));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..8)
                        .map(|_| store.allocate_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(all.len(), 64);
        assert!(store.allocate_id().is_err());
    }

    #[test]
    fn reopening_with_new_range_keeps_allocations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkward.redb");

        {
            let store = Store::open(&path, PoolRange::new(100, 110).unwrap()).unwrap();
            assert_eq!(store.allocate_id().unwrap(), 100);
            assert_eq!(store.allocate_id().unwrap(), 101);
        }

        let store = Store::open(&path, PoolRange::new(101, 105).unwrap()).unwrap();
        assert!(store.is_allocated(100).unwrap());
        assert!(store.is_allocated(101).unwrap());
        // 102, 103, 104 remain free; 105..110 dropped from the free set.
        assert_eq!(store.free_count().unwrap(), 3);
        assert_eq!(store.allocate_id().unwrap(), 102);

        // An allocated id that left the range is not returned to the pool.
        assert!(store.free_id(100).unwrap());
        assert_eq!(store.free_count().unwrap(), 2);
    }
}
