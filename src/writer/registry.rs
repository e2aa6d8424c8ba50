//! Append-only, index-addressed registry.
//!
//! Readers (`get`, `iter`) never take a lock: entries live in write-once
//! slots grouped into segments of doubling size, so an entry never moves once
//! published. Appends are serialized by a mutex and publish the slot before
//! the length is advanced.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// log2 of the first segment's capacity.
const FIRST_SHIFT: u32 = 4;

/// Enough segments to address every `usize` index.
const SEGMENTS: usize = (usize::BITS - FIRST_SHIFT) as usize;

type Segment<T> = Box<[OnceLock<T>]>;

pub(crate) struct AppendOnly<T> {
    segments: [OnceLock<Segment<T>>; SEGMENTS],
    len: AtomicUsize,
    append: Mutex<()>,
}

/// Maps an index to (segment, offset). Segment `k` holds `16 << k` slots.
const fn locate(index: usize) -> (usize, usize) {
    let pos = index + (1 << FIRST_SHIFT);
    let high = usize::BITS - 1 - pos.leading_zeros();
    let segment = (high - FIRST_SHIFT) as usize;
    (segment, pos - (1 << high))
}

fn segment_capacity(segment: usize) -> usize {
    1usize << (segment as u32 + FIRST_SHIFT)
}

impl<T> AppendOnly<T> {
    pub(crate) fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| OnceLock::new()),
            len: AtomicUsize::new(0),
            append: Mutex::new(()),
        }
    }

    /// Appends `value` and returns its index.
    pub(crate) fn push(&self, value: T) -> usize {
        // The guard protects no data, only the append order.
        let _guard = self.append.lock().unwrap_or_else(PoisonError::into_inner);

        let index = self.len.load(Ordering::Relaxed);
        let (segment, offset) = locate(index);
        let slots = self.segments[segment].get_or_init(|| {
            (0..segment_capacity(segment)).map(|_| OnceLock::new()).collect()
        });
        let published = slots[offset].set(value).is_ok();
        debug_assert!(published, "registry slot {index} written twice");

        self.len.store(index + 1, Ordering::Release);
        index
    }

    /// Returns the entry at `index` if it has been published.
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len.load(Ordering::Acquire) {
            return None;
        }
        let (segment, offset) = locate(index);
        self.segments[segment].get()?.get(offset)?.get()
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Iterates over the entries published when the call was made, in index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        let len = self.len();
        (0..len).filter_map(move |index| self.get(index).map(|entry| (index, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_locate_segment_boundaries() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(15), (0, 15));
        assert_eq!(locate(16), (1, 0));
        assert_eq!(locate(47), (1, 31));
        assert_eq!(locate(48), (2, 0));
        assert_eq!(segment_capacity(0), 16);
        assert_eq!(segment_capacity(2), 64);
    }

    #[test]
    fn test_push_returns_dense_indices() {
        let registry = AppendOnly::new();
        for expected in 0..200usize {
            assert_eq!(registry.push(expected * 10), expected);
        }
        assert_eq!(registry.len(), 200);
        for i in 0..200usize {
            assert_eq!(registry.get(i), Some(&(i * 10)));
        }
        assert_eq!(registry.get(200), None);
        assert_eq!(registry.get(usize::MAX), None);
    }

    #[test]
    fn test_iter_is_in_index_order() {
        let registry = AppendOnly::new();
        for name in ["a", "b", "c"] {
            registry.push(name);
        }
        let seen: Vec<_> = registry.iter().collect();
        assert_eq!(seen, vec![(0, &"a"), (1, &"b"), (2, &"c")]);
    }

    #[test]
    fn test_concurrent_pushes_are_all_visible() {
        let registry = Arc::new(AppendOnly::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..250).map(|i| registry.push(t * 1000 + i)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut indices: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..1000).collect::<Vec<_>>());
        assert_eq!(registry.iter().count(), 1000);
    }
}
