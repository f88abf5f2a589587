use std::ops::Index;

use crate::utils::MyHash;

struct Entry<T> {
    value: T,
    next: usize,
}

/// Append-only hash-consing table.
///
/// Values are deduplicated through an open-chaining bucket array, so equal
/// values always resolve to the same index. Index 0 is a sentry and never
/// holds a value. Nodes are kept for the lifetime of the table; there is no
/// reclamation (a solve session owns one table and drops it wholesale).
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T> {
    /// Create a new table with `2^bits` hash buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Bucket bits should be in the range 0..=31");

        let buckets_size = 1usize << bits;
        Self {
            data: Vec::new(),
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
        }
    }

    /// Number of stored values (excluding the sentry).
    pub fn size(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Append a value without deduplication and return its index.
    pub fn add(&mut self, value: T) -> usize
    where
        T: Default,
    {
        if self.data.is_empty() {
            // Sentry cell.
            self.data.push(Entry {
                value: T::default(),
                next: 0,
            });
        }
        let index = self.data.len();
        self.data.push(Entry { value, next: 0 });
        index
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Insert a value if not already present and return its index.
    pub fn put(&mut self, value: T) -> usize {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            let i = self.add(value);
            self.buckets[bucket_index] = i;
            return i;
        }

        loop {
            assert!(index > 0);

            if &value == self.value(index) {
                return index;
            }

            let next = self.data[index].next;
            if next == 0 {
                let i = self.add(value);
                self.data[index].next = i;
                return i;
            }
            index = next;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_add() {
        let mut table = Table::new(2);
        let index = table.add(Item(42));
        assert_eq!(index, 1);
        assert_eq!(table[index], Item(42));
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn test_put_deduplicates() {
        let mut table = Table::new(2);
        let a = table.put(Item(5));
        let b = table.put(Item(7));
        let c = table.put(Item(5));
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn test_put_collision_chain() {
        // Item(5) and Item(-5) hash identically but are distinct values.
        let mut table = Table::new(2);
        let a = table.put(Item(5));
        let b = table.put(Item(-5));
        assert_ne!(a, b);
        assert_eq!(table[a], Item(5));
        assert_eq!(table[b], Item(-5));
    }
}
