//! Native key-value store (params under `0x01`, key rotations under `0x04`).
//!
//! Writes during a block land in the working map; `commit` publishes them.

use std::collections::BTreeMap;

use qc_18_staking::KeyValueStore;
use shared_types::Hash;

use super::app_hash::StoreDigest;

pub type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Clone, Default)]
pub struct NativeStore {
    committed: Entries,
    working: Entries,
}

impl NativeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopen a store from previously committed entries.
    pub fn from_entries(entries: Entries) -> Self {
        Self {
            working: entries.clone(),
            committed: entries,
        }
    }

    pub fn commit(&mut self) {
        self.committed = self.working.clone();
    }

    /// Drop uncommitted writes.
    pub fn discard(&mut self) {
        self.working = self.committed.clone();
    }

    pub fn committed(&self) -> &Entries {
        &self.committed
    }

    /// Digest of the committed entries under `digest`.
    pub fn digest(&self, digest: &dyn StoreDigest) -> Hash {
        digest.digest(&self.committed)
    }
}

impl KeyValueStore for NativeStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.working.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.working.insert(key.to_vec(), value);
    }

    fn remove(&mut self, key: &[u8]) {
        self.working.remove(key);
    }
}
