//! Key events derived from two consecutive debounced states.

use crate::matrix::KeyBits;

/// A debounced key changed state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub index: u8,
    pub pressed: bool,
}

/// Iterator over the keys that differ between two states,
/// lowest index first.
#[derive(Clone, Debug)]
pub struct Changes {
    changed: u64,
    now: KeyBits,
}

impl Iterator for Changes {
    type Item = KeyEvent;

    fn next(&mut self) -> Option<KeyEvent> {
        if self.changed == 0 {
            return None;
        }
        let index = self.changed.trailing_zeros() as usize;
        self.changed &= self.changed - 1;
        Some(KeyEvent {
            index: index as u8,
            pressed: self.now.is_set(index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.changed.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Changes {}

/// Events turning `previous` into `now`. Held keys produce nothing.
pub fn changes(previous: KeyBits, now: KeyBits) -> Changes {
    Changes {
        changed: (previous ^ now).bits(),
        now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_change_no_events() {
        let held = KeyBits::from_bits(0b1011);
        assert_eq!(changes(held, held).count(), 0);
        assert_eq!(changes(KeyBits::EMPTY, KeyBits::EMPTY).count(), 0);
    }

    #[test]
    fn test_events_in_index_order() {
        let previous = KeyBits::from_bits((1 << 2) | (1 << 50));
        let now = KeyBits::from_bits((1 << 2) | (1 << 0) | (1 << 33));
        let events: Vec<_> = changes(previous, now).collect();
        assert_eq!(
            events,
            vec![
                KeyEvent { index: 0, pressed: true },
                KeyEvent { index: 33, pressed: true },
                KeyEvent { index: 50, pressed: false },
            ]
        );
    }

    #[test]
    fn test_size_hint() {
        let it = changes(KeyBits::EMPTY, KeyBits::from_bits(u64::MAX));
        assert_eq!(it.len(), 64);
        assert_eq!(it.last(), Some(KeyEvent { index: 63, pressed: true }));
    }
}
