//! Per-key debounce logic.
//!
//! Each key has a counter that must reach the threshold in consecutive
//! readings disagreeing with the debounced state before that state
//! changes. A single agreeing reading resets the counter, so contact
//! bounce shorter than the threshold never reaches the dispatcher.

use midikbd_keymap::KEYS;

use crate::matrix::KeyBits;

pub struct Debouncer {
    /// Debounced key states.
    stable: KeyBits,
    /// Debounced states before the last update.
    previous: KeyBits,
    /// Per-key counters tracking consecutive raw readings that differ from the debounced state.
    counters: [u8; KEYS],
    threshold: u8,
}

impl Debouncer {
    /// `threshold` is clamped to at least one cycle.
    pub const fn new(threshold: u8) -> Self {
        Self {
            stable: KeyBits::EMPTY,
            previous: KeyBits::EMPTY,
            counters: [0; KEYS],
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Feed one raw scan (set bit = pressed) and return the debounced state.
    pub fn update(&mut self, raw: KeyBits) -> KeyBits {
        self.previous = self.stable;

        for index in 0..KEYS {
            let pressed = raw.is_set(index);
            if pressed == self.stable.is_set(index) {
                // Raw matches debounced state, reset counter
                self.counters[index] = 0;
            } else {
                self.counters[index] += 1;
                if self.counters[index] >= self.threshold {
                    self.stable.set(index, pressed);
                    self.counters[index] = 0;
                }
            }
        }

        self.stable
    }

    pub fn stable(&self) -> KeyBits {
        self.stable
    }

    pub fn previous(&self) -> KeyBits {
        self.previous
    }

    /// Forget all key state.
    pub fn reset(&mut self) {
        self.stable = KeyBits::EMPTY;
        self.previous = KeyBits::EMPTY;
        self.counters = [0; KEYS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: usize) -> KeyBits {
        let mut bits = KeyBits::EMPTY;
        bits.set(index, true);
        bits
    }

    #[test]
    fn test_press_after_threshold() {
        let mut deb = Debouncer::new(3);
        assert!(deb.update(key(5)).is_empty());
        assert!(deb.update(key(5)).is_empty());
        assert_eq!(deb.update(key(5)), key(5));
        assert_eq!(deb.previous(), KeyBits::EMPTY);
        assert_eq!(deb.update(key(5)), key(5));
        assert_eq!(deb.previous(), key(5));
    }

    #[test]
    fn test_release_after_threshold() {
        let mut deb = Debouncer::new(3);
        for _ in 0..3 {
            deb.update(key(40));
        }
        assert_eq!(deb.stable(), key(40));
        deb.update(KeyBits::EMPTY);
        deb.update(KeyBits::EMPTY);
        assert_eq!(deb.stable(), key(40));
        assert!(deb.update(KeyBits::EMPTY).is_empty());
    }

    #[test]
    fn test_bounce_never_flips() {
        let mut deb = Debouncer::new(3);
        for _ in 0..20 {
            deb.update(key(7));
            deb.update(key(7));
            assert!(deb.update(KeyBits::EMPTY).is_empty());
        }
    }

    #[test]
    fn test_keys_counted_independently() {
        let mut deb = Debouncer::new(2);
        deb.update(key(1));
        let both = key(1) ^ key(63);
        assert_eq!(deb.update(both), key(1));
        assert_eq!(deb.update(both), both);
    }

    #[test]
    fn test_zero_threshold_clamped() {
        let mut deb = Debouncer::new(0);
        assert_eq!(deb.threshold(), 1);
        assert_eq!(deb.update(key(0)), key(0));
    }

    #[test]
    fn test_reset() {
        let mut deb = Debouncer::new(1);
        deb.update(key(9));
        deb.reset();
        assert!(deb.stable().is_empty());
        assert!(deb.previous().is_empty());
    }
}
