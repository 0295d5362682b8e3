//! Compile-time defaults and the runtime settings built from them.

use midikbd_keymap::COLS;

use crate::error::ConfigError;

/// Period of the keyboard scan task.
pub const SCAN_PERIOD_MS: u32 = 10;
/// Period of the status LED toggle.
pub const HEARTBEAT_PERIOD_MS: u32 = 1000;
/// Wait between driving a column and reading the rows.
pub const SETTLE_DELAY_US: u32 = 1000;
/// Consecutive disagreeing scans before a key changes state.
pub const DEBOUNCE_THRESHOLD: u8 = 3;
pub const MIDI_CHANNEL: u8 = 1;
pub const NOTE_ON_VELOCITY: u8 = 100;
pub const NOTE_OFF_VELOCITY: u8 = 0;
/// Idle wait between scheduler polls.
pub const IDLE_DELAY_MS: u32 = 2;
/// Sub-address of the matrix expander.
pub const MATRIX_SUBADDRESS: u8 = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub scan_period_ms: u32,
    pub heartbeat_period_ms: u32,
    pub settle_us: u32,
    pub debounce_threshold: u8,
    pub channel: u8,
    pub note_on_velocity: u8,
    pub note_off_velocity: u8,
    pub idle_ms: u32,
}

impl Config {
    pub const DEFAULT: Config = Config {
        scan_period_ms: SCAN_PERIOD_MS,
        heartbeat_period_ms: HEARTBEAT_PERIOD_MS,
        settle_us: SETTLE_DELAY_US,
        debounce_threshold: DEBOUNCE_THRESHOLD,
        channel: MIDI_CHANNEL,
        note_on_velocity: NOTE_ON_VELOCITY,
        note_off_velocity: NOTE_OFF_VELOCITY,
        idle_ms: IDLE_DELAY_MS,
    };

    /// Time one full matrix scan spends settling, rounded up to whole ms.
    pub fn scan_time_ms(&self) -> u32 {
        (self.settle_us.saturating_mul(COLS as u32)).div_ceil(1000)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if !(1..=16).contains(&self.channel) {
            return Err(ConfigError::Channel(self.channel));
        }
        for velocity in [self.note_on_velocity, self.note_off_velocity] {
            if velocity > 127 {
                return Err(ConfigError::Velocity(velocity));
            }
        }
        if self.scan_period_ms == 0 || self.heartbeat_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        let scan_ms = self.scan_time_ms();
        if self.scan_period_ms < scan_ms {
            return Err(ConfigError::ScanTooFast {
                period_ms: self.scan_period_ms,
                scan_ms,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
