//! Reference-counted index pool.
//!
//! A [`RefCountPool`] hands out integer slots for the parallel element arrays
//! of a [`DynamicMesh`](super::DynamicMesh). Each slot carries a reference
//! count; a count of zero marks the slot as dead. Freed slots go onto a free
//! list and are handed out again by later allocations, so indices of live
//! elements never shift.

/// Sparse pool of reference-counted slots with free-slot reuse.
#[derive(Debug, Clone, Default)]
pub struct RefCountPool {
    counts: Vec<u32>,
    free: Vec<usize>,
    live: usize,
}

impl RefCountPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty pool with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Allocate a slot with reference count 1.
    ///
    /// Reuses the most recently freed slot if there is one.
    pub fn allocate(&mut self) -> usize {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.counts[index] = 1;
            return index;
        }
        self.counts.push(1);
        self.counts.len() - 1
    }

    /// Increment the reference count of a live slot.
    #[inline]
    pub fn increment(&mut self, index: usize) {
        debug_assert!(self.is_valid(index), "increment of dead slot {}", index);
        self.counts[index] += 1;
    }

    /// Decrement the reference count of a live slot.
    ///
    /// Returns `true` if the slot died (its count reached zero).
    pub fn decrement(&mut self, index: usize) -> bool {
        debug_assert!(self.is_valid(index), "decrement of dead slot {}", index);
        self.counts[index] -= 1;
        if self.counts[index] == 0 {
            self.free.push(index);
            self.live -= 1;
            true
        } else {
            false
        }
    }

    /// Force a slot dead regardless of its count.
    pub fn release(&mut self, index: usize) {
        if self.is_valid(index) {
            self.counts[index] = 0;
            self.free.push(index);
            self.live -= 1;
        }
    }

    /// Check whether a slot is alive.
    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        index < self.counts.len() && self.counts[index] > 0
    }

    /// Reference count of a slot (0 for dead or never-allocated slots).
    #[inline]
    pub fn ref_count(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Exclusive upper bound of all slots ever allocated, dead ones included.
    #[inline]
    pub fn max_index(&self) -> usize {
        self.counts.len()
    }

    /// Number of live slots.
    #[inline]
    pub fn count(&self) -> usize {
        self.live
    }

    /// Whether no slot has died since the pool was created or compacted.
    #[inline]
    pub fn is_dense(&self) -> bool {
        self.live == self.counts.len()
    }

    /// Iterate over the live slot indices in increasing order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, _)| i)
    }
}

/// Store `value` at `index`, growing the vector by one if `index` is its length.
///
/// Used together with [`RefCountPool::allocate`], which returns either a reused
/// slot or the next fresh one.
pub(crate) fn insert_at<T>(items: &mut Vec<T>, index: usize, value: T) {
    if index == items.len() {
        items.push(value);
    } else {
        items[index] = value;
    }
}
