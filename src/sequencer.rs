//! Reorder buffer for ordered delivery.

use std::collections::BTreeMap;

/// Releases items in sequence order within one session generation.
///
/// Items from an older generation are dropped; the first item of a newer
/// generation resets the buffer.
#[derive(Debug)]
pub(crate) struct Sequencer<T> {
    generation: u64,
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for Sequencer<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            next: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<T> Sequencer<T> {
    /// Insert `item` and return everything now releasable, in order.
    pub(crate) fn push(&mut self, generation: u64, seq: u64, item: T) -> Vec<T> {
        if generation < self.generation {
            return Vec::new();
        }
        if generation > self.generation {
            self.generation = generation;
            self.next = 0;
            self.pending.clear();
        }
        if seq < self.next {
            return Vec::new();
        }

        self.pending.insert(seq, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_passes_through() {
        let mut seq = Sequencer::default();
        assert_eq!(seq.push(1, 0, 'a'), vec!['a']);
        assert_eq!(seq.push(1, 1, 'b'), vec!['b']);
        assert_eq!(seq.pending(), 0);
    }

    #[test]
    fn test_out_of_order_is_held() {
        let mut seq = Sequencer::default();
        assert!(seq.push(1, 2, 'c').is_empty());
        assert!(seq.push(1, 1, 'b').is_empty());
        assert_eq!(seq.pending(), 2);
        assert_eq!(seq.push(1, 0, 'a'), vec!['a', 'b', 'c']);
        assert_eq!(seq.pending(), 0);
    }

    #[test]
    fn test_new_generation_resets() {
        let mut seq = Sequencer::default();
        assert!(seq.push(1, 5, 'x').is_empty());
        assert_eq!(seq.push(2, 0, 'a'), vec!['a']);
        assert_eq!(seq.pending(), 0);

        // Stale generation ignored
        assert!(seq.push(1, 1, 'y').is_empty());
        assert_eq!(seq.push(2, 1, 'b'), vec!['b']);
    }

    #[test]
    fn test_duplicate_sequence_dropped() {
        let mut seq = Sequencer::default();
        assert_eq!(seq.push(1, 0, 'a'), vec!['a']);
        assert!(seq.push(1, 0, 'z').is_empty());
    }
}
