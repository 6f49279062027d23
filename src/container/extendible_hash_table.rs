use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use parking_lot::Mutex;

/// A bucket holds up to `bucket_size` entries and its local split depth.
#[derive(Debug)]
struct Bucket<K, V> {
    local_depth: u32,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: u32) -> Self {
        Self {
            local_depth,
            items: Vec::new(),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Directory plus bucket table. Multiple directory slots may reference
/// the same bucket; sharing is modeled by storing bucket-table indices
/// in the directory rather than the buckets themselves.
#[derive(Debug)]
struct TableState<K, V> {
    global_depth: u32,
    directory: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// In-memory extendible hash table with directory doubling.
///
/// The directory has `2^global_depth` slots addressed by the low
/// `global_depth` bits of the key hash. A bucket at local depth `d` is
/// referenced by exactly `2^(global_depth - d)` slots. One table-level
/// mutex guards the directory and all buckets.
pub struct ExtendibleHashTable<K, V, S = BuildHasherDefault<DefaultHasher>> {
    bucket_size: usize,
    hasher: S,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq,
{
    /// Creates a table with two depth-1 buckets and `global_depth = 1`.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, BuildHasherDefault::default())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size >= 1, "bucket_size must be at least 1");
        Self {
            bucket_size,
            hasher,
            state: Mutex::new(TableState {
                global_depth: 1,
                directory: vec![0, 1],
                buckets: vec![Bucket::new(1), Bucket::new(1)],
            }),
        }
    }

    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    fn dir_index(hash: u64, global_depth: u32) -> usize {
        (hash & ((1u64 << global_depth) - 1)) as usize
    }

    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let hash = self.hash(key);
        let state = self.state.lock();
        let bucket = state.directory[Self::dir_index(hash, state.global_depth)];
        state.buckets[bucket].find(key).cloned()
    }

    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let mut state = self.state.lock();
        let bucket = state.directory[Self::dir_index(hash, state.global_depth)];
        state.buckets[bucket].remove(key)
    }

    /// Inserts or overwrites the value for `key` (last write wins).
    /// A full bucket splits, doubling the directory when the bucket's
    /// local depth has caught up with the global depth; splitting repeats
    /// until the target bucket has room.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut state = self.state.lock();

        loop {
            let bucket_idx = state.directory[Self::dir_index(hash, state.global_depth)];

            if let Some((_, v)) = state.buckets[bucket_idx]
                .items
                .iter_mut()
                .find(|(k, _)| *k == key)
            {
                *v = value;
                return;
            }

            if state.buckets[bucket_idx].items.len() < self.bucket_size {
                state.buckets[bucket_idx].items.push((key, value));
                return;
            }

            if state.buckets[bucket_idx].local_depth == state.global_depth {
                // Duplicate the lower half of the directory into the new
                // upper half so every slot keeps its referent.
                let prev_len = state.directory.len();
                for i in 0..prev_len {
                    let b = state.directory[i];
                    state.directory.push(b);
                }
                state.global_depth += 1;
            }

            self.split_bucket(&mut state, bucket_idx);
        }
    }

    /// Splits `bucket_idx` one bit deeper: entries whose hash has the new
    /// high bit set move to a fresh bucket, and every directory slot that
    /// referenced the old bucket and has that bit set is rewritten.
    fn split_bucket(&self, state: &mut TableState<K, V>, bucket_idx: usize) {
        let old_depth = state.buckets[bucket_idx].local_depth;
        let split_bit = 1u64 << old_depth;

        let mut new_bucket = Bucket::new(old_depth + 1);
        let items = std::mem::take(&mut state.buckets[bucket_idx].items);
        for (k, v) in items {
            if self.hash(&k) & split_bit != 0 {
                new_bucket.items.push((k, v));
            } else {
                state.buckets[bucket_idx].items.push((k, v));
            }
        }
        state.buckets[bucket_idx].local_depth = old_depth + 1;

        let new_idx = state.buckets.len();
        state.buckets.push(new_bucket);

        // Slots referencing the split bucket agree on the low old_depth
        // bits; the new bit picks the referent.
        let split_bit = split_bit as usize;
        for i in 0..state.directory.len() {
            if state.directory[i] == bucket_idx && i & split_bit != 0 {
                state.directory[i] = new_idx;
            }
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.state.lock().global_depth
    }

    pub fn local_depth(&self, dir_index: usize) -> u32 {
        let state = self.state.lock();
        state.buckets[state.directory[dir_index]].local_depth
    }

    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }

    pub fn dir_size(&self) -> usize {
        self.state.lock().directory.len()
    }

    /// Checks the directory-slot invariant: a bucket at local depth `d`
    /// with global depth `D` is referenced by exactly `2^(D-d)` slots,
    /// forming an arithmetic progression with stride `2^d`.
    #[cfg(test)]
    fn check_directory_invariant(&self) {
        let state = self.state.lock();
        assert_eq!(state.directory.len(), 1usize << state.global_depth);

        for (bucket_idx, bucket) in state.buckets.iter().enumerate() {
            let slots: Vec<usize> = state
                .directory
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == bucket_idx)
                .map(|(i, _)| i)
                .collect();
            if slots.is_empty() {
                continue;
            }
            let d = bucket.local_depth;
            assert!(d <= state.global_depth);
            assert_eq!(slots.len(), 1usize << (state.global_depth - d));
            let stride = 1usize << d;
            for pair in slots.windows(2) {
                assert_eq!(pair[1] - pair[0], stride);
            }
            let low = slots[0] & (stride - 1);
            assert_eq!(slots[0], low);
            for (k, _) in &bucket.items {
                assert_eq!(Self::dir_index(self.hash(k), d), low);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    /// Hashes an integer key to itself so split bits are predictable.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            let mut buf = [0u8; 8];
            let n = bytes.len().min(8);
            buf[..n].copy_from_slice(&bytes[..n]);
            self.0 = u64::from_le_bytes(buf);
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }

        fn write_i32(&mut self, n: i32) {
            self.0 = n as u64;
        }
    }

    type IdentityTable<V> = ExtendibleHashTable<u64, V, BuildHasherDefault<IdentityHasher>>;

    fn identity_table<V>(bucket_size: usize) -> IdentityTable<V> {
        ExtendibleHashTable::with_hasher(bucket_size, BuildHasherDefault::default())
    }

    #[test]
    fn test_insert_find_remove() {
        let table = ExtendibleHashTable::new(4);

        table.insert(1, "a");
        table.insert(2, "b");
        table.insert(3, "c");

        assert_eq!(table.find(&1), Some("a"));
        assert_eq!(table.find(&2), Some("b"));
        assert_eq!(table.find(&3), Some("c"));
        assert_eq!(table.find(&4), None);

        assert!(table.remove(&2));
        assert!(!table.remove(&2));
        assert_eq!(table.find(&2), None);
    }

    #[test]
    fn test_insert_overwrites_duplicate_key() {
        let table = ExtendibleHashTable::new(2);

        table.insert(7, "old");
        table.insert(7, "new");
        assert_eq!(table.find(&7), Some("new"));
    }

    #[test]
    fn test_split_on_colliding_low_bits() {
        // 4, 12 and 16 share the low bit (and the low two bits); the
        // third insert doubles the directory and splits until the keys
        // separate on bit 2.
        let table = identity_table(2);
        assert_eq!(table.global_depth(), 1);

        table.insert(4, "a");
        table.insert(12, "b");
        table.insert(16, "c");

        assert_eq!(table.global_depth(), 3);
        assert_eq!(table.dir_size(), 8);
        assert_eq!(table.find(&4), Some("a"));
        assert_eq!(table.find(&12), Some("b"));
        assert_eq!(table.find(&16), Some("c"));
        table.check_directory_invariant();
    }

    #[test]
    fn test_directory_invariant_after_growth() {
        let table = identity_table(2);

        for i in 0..64u64 {
            table.insert(i, i * 10);
            table.check_directory_invariant();
        }

        for i in 0..64u64 {
            assert_eq!(table.find(&i), Some(i * 10));
        }
    }

    #[test]
    fn test_bucket_size_one() {
        let table = identity_table(1);

        for i in 0..16u64 {
            table.insert(i, i);
        }
        for i in 0..16u64 {
            assert_eq!(table.find(&i), Some(i));
        }
        table.check_directory_invariant();
    }

    #[test]
    fn test_remove_then_reinsert() {
        let table = ExtendibleHashTable::new(2);

        for i in 0..32 {
            table.insert(i, i);
        }
        for i in 0..32 {
            assert!(table.remove(&i));
        }
        for i in 0..32 {
            assert_eq!(table.find(&i), None);
        }
        for i in 0..32 {
            table.insert(i, i + 100);
        }
        for i in 0..32 {
            assert_eq!(table.find(&i), Some(i + 100));
        }
    }
}
