//! MIDI keyboard firmware core.
//!
//! An 8×8 key matrix behind an MCP23017 I/O expander is scanned every few
//! milliseconds; debounced key changes become MIDI note messages on a
//! serial byte sink. Everything here is written against `embedded-hal`
//! and `embedded-io` traits, so the board glue only supplies the I2C bus,
//! the UART, a delay, a millisecond clock and the status LED:
//!
//! - [`expander`]: pool of MCP23017 devices on one bus
//! - [`matrix`]: column-driven scan of the key grid
//! - [`debounce`] and [`events`]: stable key state and its changes
//! - [`midi`]: channel messages, note names, output stream
//! - [`scheduler`] and [`tasks`]: the cooperative main loop

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod expander;
pub mod matrix;
pub mod midi;
pub mod scheduler;
pub mod tasks;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::Config;
pub use error::{ConfigError, Error};
pub use expander::{DeviceId, ExpanderPool, Port};
pub use matrix::{KeyBits, KeyMatrix, SingleKey};
pub use midi::{Message, MidiOut};
pub use scheduler::{Clock, Scheduler, Task};
pub use tasks::{Heartbeat, KeyboardTask};
