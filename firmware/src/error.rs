//! Error types for the expander driver and the scan pipeline.

use core::fmt;

use crate::expander::DeviceId;

/// Errors reported by the expander pool and everything built on it.
///
/// `E` is the bus error type of the `embedded-hal` I2C implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// A bus transaction failed.
    Bus(E),
    /// Sub-address outside the 3-bit range.
    InvalidSubaddress(u8),
    /// Every slot in the pool is taken.
    PoolFull,
    /// A ready device already answers on this sub-address.
    AddressInUse(u8),
    /// The handle does not refer to a ready device.
    UnknownDevice(DeviceId),
    /// A register read back during bring-up does not hold what was written.
    Verify { register: u8, expected: u8, found: u8 },
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "bus error: {err:?}"),
            Self::InvalidSubaddress(sub) => {
                write!(f, "invalid sub-address {sub} (must be 0..=7)")
            }
            Self::PoolFull => write!(f, "no free expander slot"),
            Self::AddressInUse(sub) => write!(f, "sub-address {sub} already in use"),
            Self::UnknownDevice(id) => write!(f, "unknown or unusable device {}", id.index()),
            Self::Verify {
                register,
                expected,
                found,
            } => write!(
                f,
                "register 0x{register:02X} reads 0x{found:02X}, expected 0x{expected:02X}"
            ),
        }
    }
}

/// Invalid runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Debounce threshold must be at least one cycle.
    ZeroThreshold,
    /// MIDI channel outside 1..=16.
    Channel(u8),
    /// Velocity above 127.
    Velocity(u8),
    /// A task period of zero.
    ZeroPeriod,
    /// The scan period is shorter than one full matrix scan.
    ScanTooFast { period_ms: u32, scan_ms: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreshold => write!(f, "debounce threshold must be at least 1"),
            Self::Channel(ch) => write!(f, "MIDI channel {ch} outside 1..=16"),
            Self::Velocity(v) => write!(f, "velocity {v} above 127"),
            Self::ZeroPeriod => write!(f, "task period must be non-zero"),
            Self::ScanTooFast { period_ms, scan_ms } => write!(
                f,
                "scan period {period_ms} ms is shorter than a full scan ({scan_ms} ms)"
            ),
        }
    }
}
