//! Key matrix scanning through one MCP23017.
//!
//! Port A drives the eight columns (active low), port B reads the eight
//! rows through the expander's pull-ups. A closed switch at `(row, col)`
//! pulls the row low while its column is driven.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use log::{debug, info};
use midikbd_keymap::{KeyMap, COLS, KEYS, ROWS};

use crate::error::Error;
use crate::expander::{DeviceId, Direction, ExpanderPool, Port};

/// Port driving the columns.
pub const COLUMN_PORT: Port = Port::A;
/// Port reading the rows.
pub const ROW_PORT: Port = Port::B;

/// Wait after configuring the ports before the first scan.
const STARTUP_DELAY_MS: u32 = 10;

/// Set of matrix cells, bit `row * COLS + col`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyBits(u64);

impl KeyBits {
    pub const EMPTY: KeyBits = KeyBits(0);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_set(self, index: usize) -> bool {
        index < KEYS && self.0 & (1 << index) != 0
    }

    pub fn set(&mut self, index: usize, on: bool) {
        if index >= KEYS {
            return;
        }
        if on {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Lowest set index.
    pub fn first(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Set indices in increasing order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut rest = self.0;
        core::iter::from_fn(move || {
            if rest == 0 {
                return None;
            }
            let index = rest.trailing_zeros() as usize;
            rest &= rest - 1;
            Some(index)
        })
    }
}

impl core::ops::BitXor for KeyBits {
    type Output = KeyBits;

    fn bitxor(self, rhs: KeyBits) -> KeyBits {
        KeyBits(self.0 ^ rhs.0)
    }
}

impl core::ops::BitAnd for KeyBits {
    type Output = KeyBits;

    fn bitand(self, rhs: KeyBits) -> KeyBits {
        KeyBits(self.0 & rhs.0)
    }
}

/// Result of [`KeyMatrix::single_key`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SingleKey {
    None,
    Key { index: usize, label: &'static str },
    /// More than one key is down; holds how many.
    Ambiguous(u32),
}

pub struct KeyMatrix {
    device: DeviceId,
    keymap: &'static KeyMap,
    settle_us: u32,
}

impl KeyMatrix {
    /// Configure the ports of `device` for scanning and bind `keymap`.
    pub fn init<I2C, D>(
        pool: &mut ExpanderPool<I2C>,
        device: DeviceId,
        keymap: &'static KeyMap,
        settle_us: u32,
        delay: &mut D,
    ) -> Result<Self, Error<I2C::Error>>
    where
        I2C: I2c<SevenBitAddress>,
        D: DelayNs,
    {
        // Latch before direction so columns never float low.
        pool.set_output(device, COLUMN_PORT, 0xFF, PinState::High)?;
        pool.set_direction(device, COLUMN_PORT, 0xFF, Direction::Output)?;
        pool.set_direction(device, ROW_PORT, 0xFF, Direction::Input)?;
        pool.set_pull_up(device, ROW_PORT, 0xFF, true)?;
        delay.delay_ms(STARTUP_DELAY_MS);

        info!(
            "matrix: {}x{} ready on device {}, settle {} us",
            ROWS,
            COLS,
            device.index(),
            settle_us
        );
        Ok(Self {
            device,
            keymap,
            settle_us,
        })
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn keymap(&self) -> &'static KeyMap {
        self.keymap
    }

    /// Worst-case duration of one scan in milliseconds, rounded up.
    pub fn scan_time_ms(&self) -> u32 {
        (self.settle_us * COLS as u32).div_ceil(1000)
    }

    /// Read every cell once. Columns are always left high on return.
    pub fn scan<I2C, D>(
        &self,
        pool: &mut ExpanderPool<I2C>,
        delay: &mut D,
    ) -> Result<KeyBits, Error<I2C::Error>>
    where
        I2C: I2c<SevenBitAddress>,
        D: DelayNs,
    {
        let result = self.scan_columns(pool, delay);
        let restored = pool.set_output_port(self.device, COLUMN_PORT, 0xFF);
        let bits = result?;
        restored?;
        if !bits.is_empty() {
            debug!("matrix: raw {:016X}", bits.bits());
        }
        Ok(bits)
    }

    fn scan_columns<I2C, D>(
        &self,
        pool: &mut ExpanderPool<I2C>,
        delay: &mut D,
    ) -> Result<KeyBits, Error<I2C::Error>>
    where
        I2C: I2c<SevenBitAddress>,
        D: DelayNs,
    {
        let mut bits = KeyBits::EMPTY;
        for col in 0..COLS {
            pool.set_output_port(self.device, COLUMN_PORT, !(1u8 << col))?;
            delay.delay_us(self.settle_us);
            let rows = pool.input_port(self.device, ROW_PORT)?;
            for row in 0..ROWS {
                if rows & (1 << row) == 0 {
                    bits.set(midikbd_keymap::index(row, col), true);
                }
            }
        }
        Ok(bits)
    }

    /// The one pressed key, if exactly one is down.
    pub fn single_key<I2C, D>(
        &self,
        pool: &mut ExpanderPool<I2C>,
        delay: &mut D,
    ) -> Result<SingleKey, Error<I2C::Error>>
    where
        I2C: I2c<SevenBitAddress>,
        D: DelayNs,
    {
        let bits = self.scan(pool, delay)?;
        Ok(match (bits.count(), bits.first()) {
            (1, Some(index)) => SingleKey::Key {
                index,
                label: self.keymap.label(index).unwrap_or(""),
            },
            (0, _) | (_, None) => SingleKey::None,
            (count, _) => SingleKey::Ambiguous(count),
        })
    }

    /// Connectivity check: read the idle row port, then pulse column 0.
    ///
    /// Returns the idle row value; `0xFF` means no row is stuck low.
    pub fn self_test<I2C, D>(
        &self,
        pool: &mut ExpanderPool<I2C>,
        delay: &mut D,
    ) -> Result<u8, Error<I2C::Error>>
    where
        I2C: I2c<SevenBitAddress>,
        D: DelayNs,
    {
        let idle = pool.input_port(self.device, ROW_PORT)?;
        info!("matrix: self-test rows idle 0x{:02X}", idle);

        pool.set_output(self.device, COLUMN_PORT, 0x01, PinState::Low)?;
        delay.delay_ms(1);
        let low = pool.output(self.device, COLUMN_PORT, 0x01);
        pool.set_output(self.device, COLUMN_PORT, 0x01, PinState::High)?;
        let high = pool.output(self.device, COLUMN_PORT, 0x01)?;
        info!("matrix: column 0 pulsed {:?} -> {:?}", low?, high);

        Ok(idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDelay};
    use midikbd_keymap::PIANO;

    fn setup() -> (ExpanderPool<SimBus>, KeyMatrix, SimDelay) {
        let mut bus = SimBus::new();
        bus.attach(0);
        let mut pool = ExpanderPool::new(bus);
        let id = pool.add(0).unwrap();
        let mut delay = SimDelay::new();
        let matrix = KeyMatrix::init(&mut pool, id, &PIANO, 2000, &mut delay).unwrap();
        (pool, matrix, delay)
    }

    #[test]
    fn test_idle_scan_is_empty() {
        let (mut pool, matrix, mut delay) = setup();
        assert_eq!(matrix.scan(&mut pool, &mut delay).unwrap(), KeyBits::EMPTY);
    }

    #[test]
    fn test_scan_every_cell() {
        let (mut pool, matrix, mut delay) = setup();
        for row in 0..ROWS {
            for col in 0..COLS {
                pool.bus_mut().press(0, row, col);
                let bits = matrix.scan(&mut pool, &mut delay).unwrap();
                assert_eq!(bits.count(), 1, "row {row} col {col}");
                assert!(bits.is_set(row * COLS + col), "row {row} col {col}");
                pool.bus_mut().release(0, row, col);
            }
        }
    }

    #[test]
    fn test_scan_high_cells() {
        let (mut pool, matrix, mut delay) = setup();
        pool.bus_mut().press(0, 7, 7);
        pool.bus_mut().press(0, 4, 0);
        let bits = matrix.scan(&mut pool, &mut delay).unwrap();
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![32, 63]);
    }

    #[test]
    fn test_scan_settles_each_column() {
        let (mut pool, matrix, mut delay) = setup();
        let before = delay.waited_us();
        matrix.scan(&mut pool, &mut delay).unwrap();
        assert_eq!(delay.waited_us() - before, 8 * 2000);
        assert_eq!(matrix.scan_time_ms(), 16);
    }

    #[test]
    fn test_columns_restored_after_scan() {
        let (mut pool, matrix, mut delay) = setup();
        pool.bus_mut().press(0, 1, 1);
        matrix.scan(&mut pool, &mut delay).unwrap();
        assert_eq!(pool.bus_mut().register(0, 0x14), Some(0xFF));
    }

    #[test]
    fn test_columns_restored_after_error() {
        let (mut pool, matrix, mut delay) = setup();
        pool.set_output_port(matrix.device(), COLUMN_PORT, 0x00).unwrap();
        pool.bus_mut().fail_next(1);
        assert!(matches!(
            matrix.scan(&mut pool, &mut delay),
            Err(Error::Bus(_))
        ));
        assert_eq!(pool.bus_mut().register(0, 0x14), Some(0xFF));
        assert_eq!(pool.error_count(matrix.device()), Some(1));
    }

    #[test]
    fn test_single_key() {
        let (mut pool, matrix, mut delay) = setup();
        assert_eq!(
            matrix.single_key(&mut pool, &mut delay).unwrap(),
            SingleKey::None
        );

        pool.bus_mut().press(0, 0, 1);
        assert_eq!(
            matrix.single_key(&mut pool, &mut delay).unwrap(),
            SingleKey::Key {
                index: 1,
                label: "C#"
            }
        );

        pool.bus_mut().press(0, 2, 3);
        pool.bus_mut().press(0, 5, 6);
        assert_eq!(
            matrix.single_key(&mut pool, &mut delay).unwrap(),
            SingleKey::Ambiguous(3)
        );
    }

    #[test]
    fn test_self_test_reports_idle_rows() {
        let (mut pool, matrix, mut delay) = setup();
        assert_eq!(matrix.self_test(&mut pool, &mut delay).unwrap(), 0xFF);
        assert_eq!(pool.bus_mut().register(0, 0x14), Some(0xFF));
    }

    #[test]
    fn test_key_bits() {
        let mut bits = KeyBits::EMPTY;
        bits.set(40, true);
        bits.set(3, true);
        bits.set(64, true);
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.first(), Some(3));
        assert!(!bits.is_set(64));
        bits.set(3, false);
        assert_eq!(bits.bits(), 1 << 40);
    }
}
