// ============================================================
// Layer 4 — Shuffle Buffer
// ============================================================
// Streaming shuffle over an iterator, using a bounded buffer.
//
//   1. Fill the buffer with up to `capacity` items.
//   2. Emit a uniformly chosen buffered item and refill its slot
//      with the next upstream item.
//   3. Once upstream is exhausted, drain the buffer at random.
//
// With `capacity >= len` this is a full uniform shuffle; with a
// smaller buffer items can only move forward by about `capacity`
// positions. The RNG is borrowed so the caller can carry its
// state from one epoch to the next.
//
// Reference: Rust Book §13.2 (Processing a Series of Items with Iterators)
//            rand crate documentation (Rng::gen_range)

use rand::Rng;

pub struct ShuffleBuffer<'r, I: Iterator, R: Rng + ?Sized> {
    source:   I,
    buffer:   Vec<I::Item>,
    capacity: usize,
    rng:      &'r mut R,
}

impl<'r, I: Iterator, R: Rng + ?Sized> ShuffleBuffer<'r, I, R> {
    pub fn new(source: I, capacity: usize, rng: &'r mut R) -> Self {
        let capacity = capacity.max(1);
        Self { source, buffer: Vec::with_capacity(capacity), capacity, rng }
    }

    fn fill(&mut self) {
        while self.buffer.len() < self.capacity {
            match self.source.next() {
                Some(item) => self.buffer.push(item),
                None       => break,
            }
        }
    }
}

impl<I: Iterator, R: Rng + ?Sized> Iterator for ShuffleBuffer<'_, I, R> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.fill();
        if self.buffer.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(pick))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.source.size_hint();
        let held     = self.buffer.len();
        (lo + held, hi.map(|h| h + held))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn shuffled(n: usize, capacity: usize, seed: u64) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        ShuffleBuffer::new(0..n, capacity, &mut rng).collect()
    }

    #[test]
    fn test_output_is_a_permutation() {
        let mut out = shuffled(100, 16, 0);
        out.sort_unstable();
        assert_eq!(out, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_order() {
        assert_eq!(shuffled(50, 8, 7), shuffled(50, 8, 7));
    }

    #[test]
    fn test_order_actually_changes() {
        assert_ne!(shuffled(50, 64, 0), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_rng_state_carries_across_epochs() {
        let mut rng = StdRng::seed_from_u64(0);
        let first:  Vec<usize> = ShuffleBuffer::new(0..40, 64, &mut rng).collect();
        let second: Vec<usize> = ShuffleBuffer::new(0..40, 64, &mut rng).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_capacity_one_keeps_order() {
        assert_eq!(shuffled(10, 1, 3), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_source() {
        assert!(shuffled(0, 4, 0).is_empty());
    }
}
