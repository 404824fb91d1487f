//! Composite state commitment.
//!
//! ```text
//! app_hash = RIPEMD160(engine_hash ‖ native_store_hash ‖ relational_hash)
//! ```
//!
//! Every sub-hash is a fixed 32-byte digest, so plain concatenation is
//! unambiguous. The native-store digest algorithm is picked per height from a
//! [`DigestSchedule`]; the legacy algorithm only covers historical migration
//! heights.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use shared_types::{AppHash, Hash};

use super::native_store::Entries;

pub struct CompositeHasher;

impl CompositeHasher {
    pub fn combine(engine: &Hash, native: &Hash, relational: &Hash) -> AppHash {
        let mut hasher = Ripemd160::new();
        hasher.update(engine);
        hasher.update(native);
        hasher.update(relational);
        hasher.finalize().into()
    }
}

/// A digest algorithm over the native store's committed entries.
pub trait StoreDigest: Send + Sync {
    fn name(&self) -> &'static str;

    fn digest(&self, entries: &Entries) -> Hash;
}

/// Keccak-256 over entries in key order, each key and value prefixed with its
/// length as a big-endian u64.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeccakDigest;

impl StoreDigest for KeccakDigest {
    fn name(&self) -> &'static str {
        "keccak256"
    }

    fn digest(&self, entries: &Entries) -> Hash {
        let mut hasher = Keccak256::new();
        for (key, value) in entries {
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value);
        }
        hasher.finalize().into()
    }
}

/// SHA-256 over the plain concatenation of keys and values in key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyDigest;

impl StoreDigest for LegacyDigest {
    fn name(&self) -> &'static str {
        "legacy-sha256"
    }

    fn digest(&self, entries: &Entries) -> Hash {
        let mut hasher = Sha256::new();
        for (key, value) in entries {
            hasher.update(key);
            hasher.update(value);
        }
        hasher.finalize().into()
    }
}

/// Height ranges mapped to digest strategies. Heights outside every range use
/// the current strategy.
#[derive(Clone)]
pub struct DigestSchedule {
    current: Arc<dyn StoreDigest>,
    ranges: Vec<(RangeInclusive<u64>, Arc<dyn StoreDigest>)>,
}

impl Default for DigestSchedule {
    fn default() -> Self {
        Self::new(Arc::new(KeccakDigest))
    }
}

impl fmt::Debug for DigestSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestSchedule")
            .field("current", &self.current.name())
            .field(
                "ranges",
                &self
                    .ranges
                    .iter()
                    .map(|(r, d)| (r.clone(), d.name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DigestSchedule {
    pub fn new(current: Arc<dyn StoreDigest>) -> Self {
        Self {
            current,
            ranges: Vec::new(),
        }
    }

    /// Schedule with the legacy digest at each of `heights`.
    pub fn with_legacy_heights(heights: &[u64]) -> Self {
        let mut schedule = Self::default();
        for &height in heights {
            schedule.mark_legacy(height);
        }
        schedule
    }

    /// Use `digest` for every height in `range`. Later ranges win on overlap.
    pub fn insert(&mut self, range: RangeInclusive<u64>, digest: Arc<dyn StoreDigest>) {
        self.ranges.push((range, digest));
    }

    /// Use the legacy digest at exactly `height`.
    pub fn mark_legacy(&mut self, height: u64) {
        if !self.is_legacy(height) {
            self.insert(height..=height, Arc::new(LegacyDigest));
        }
    }

    pub fn select(&self, height: u64) -> &dyn StoreDigest {
        self.ranges
            .iter()
            .rev()
            .find(|(range, _)| range.contains(&height))
            .map_or(self.current.as_ref(), |(_, digest)| digest.as_ref())
    }

    fn is_legacy(&self, height: u64) -> bool {
        self.select(height).name() == LegacyDigest.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entries() -> Entries {
        Entries::from([(vec![0x01], b"params".to_vec()), (vec![0x04], b"[]".to_vec())])
    }

    #[test]
    fn test_combine_is_deterministic() {
        let a = CompositeHasher::combine(&[1; 32], &[2; 32], &[3; 32]);
        let b = CompositeHasher::combine(&[1; 32], &[2; 32], &[3; 32]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn test_combine_depends_on_order() {
        let a = CompositeHasher::combine(&[1; 32], &[2; 32], &[3; 32]);
        let b = CompositeHasher::combine(&[2; 32], &[1; 32], &[3; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_keccak_and_legacy_differ() {
        assert_ne!(KeccakDigest.digest(&entries()), LegacyDigest.digest(&entries()));
    }

    #[test]
    fn test_keccak_length_prefix_separates_boundaries() {
        let a = Entries::from([(vec![1, 2], vec![3])]);
        let b = Entries::from([(vec![1], vec![2, 3])]);
        assert_ne!(KeccakDigest.digest(&a), KeccakDigest.digest(&b));
        // The legacy algorithm cannot tell them apart
        assert_eq!(LegacyDigest.digest(&a), LegacyDigest.digest(&b));
    }

    #[test]
    fn test_keccak_uses_u64_length_prefixes() {
        let mut expected = Keccak256::new();
        expected.update([0, 0, 0, 0, 0, 0, 0, 1]);
        expected.update([0x01]);
        expected.update([0, 0, 0, 0, 0, 0, 0, 6]);
        expected.update(b"params");
        let expected: Hash = expected.finalize().into();

        let single = Entries::from([(vec![0x01], b"params".to_vec())]);
        assert_eq!(KeccakDigest.digest(&single), expected);
    }

    #[test]
    fn test_schedule_selects_legacy_only_at_marked_height() {
        let schedule = DigestSchedule::with_legacy_heights(&[100]);
        assert_eq!(schedule.select(99).name(), "keccak256");
        assert_eq!(schedule.select(100).name(), "legacy-sha256");
        assert_eq!(schedule.select(101).name(), "keccak256");
    }

    #[test]
    fn test_later_range_wins() {
        let mut schedule = DigestSchedule::default();
        schedule.insert(10..=20, Arc::new(LegacyDigest));
        schedule.insert(15..=15, Arc::new(KeccakDigest));
        assert_eq!(schedule.select(14).name(), "legacy-sha256");
        assert_eq!(schedule.select(15).name(), "keccak256");
    }

    proptest! {
        #[test]
        fn prop_single_bit_flip_changes_app_hash(
            engine in any::<[u8; 32]>(),
            native in any::<[u8; 32]>(),
            relational in any::<[u8; 32]>(),
            which in 0usize..3,
            bit in 0usize..256,
        ) {
            let original = CompositeHasher::combine(&engine, &native, &relational);
            let mut parts = [engine, native, relational];
            parts[which][bit / 8] ^= 1 << (bit % 8);
            let flipped = CompositeHasher::combine(&parts[0], &parts[1], &parts[2]);
            prop_assert_ne!(original, flipped);
        }
    }
}
