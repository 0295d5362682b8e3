//! Simulated hardware for host builds: an I2C bus with MCP23017 expanders
//! whose ports are wired through a switch matrix, plus a clock, a delay,
//! a status LED and a byte sink.
//!
//! Switch `(row, col)` connects pin `col` of port A to pin `row` of port B.
//! An input pin reads low when a closed switch ties it to an output pin
//! driven low, otherwise it follows its pull-up.

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::expander::{Port, Register, BASE_ADDRESS};
use crate::scheduler::Clock;

const REGISTERS: usize = 0x16;

/// Bus error raised by the simulation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// Nobody answered on the address.
    NoAcknowledge,
    /// Failure injected with [`SimBus::fail_next`].
    Injected,
}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::NoAcknowledge => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SimError::Injected => ErrorKind::Bus,
        }
    }
}

/// One simulated expander.
#[derive(Copy, Clone, Debug)]
pub struct SimExpander {
    regs: [u8; REGISTERS],
    stuck: [Option<u8>; REGISTERS],
    /// Closed switches, one row bitmask per column.
    switches: [u8; 8],
    pointer: u8,
}

impl SimExpander {
    /// Power-on state: every pin an input, latches and pull-ups clear.
    pub const fn new() -> Self {
        let mut regs = [0u8; REGISTERS];
        regs[Register::IoDir.address(Port::A) as usize] = 0xFF;
        regs[Register::IoDir.address(Port::B) as usize] = 0xFF;
        Self {
            regs,
            stuck: [None; REGISTERS],
            switches: [0; 8],
            pointer: 0,
        }
    }

    fn reg(&self, kind: Register, port: Port) -> u8 {
        self.regs[kind.address(port) as usize]
    }

    /// Output pins currently driven low.
    fn driven_low(&self, port: Port) -> u8 {
        !self.reg(Register::IoDir, port) & !self.reg(Register::OLat, port)
    }

    fn pin_levels(&self, port: Port) -> u8 {
        let iodir = self.reg(Register::IoDir, port);
        let pulled = self.reg(Register::Gppu, port);
        let other_low = self.driven_low(port.other());

        let mut tied_low = 0u8;
        for col in 0..8 {
            for row in 0..8 {
                if self.switches[col] & (1 << row) == 0 {
                    continue;
                }
                match port {
                    Port::B if other_low & (1 << col) != 0 => tied_low |= 1 << row,
                    Port::A if other_low & (1 << row) != 0 => tied_low |= 1 << col,
                    _ => {}
                }
            }
        }

        let inputs = (pulled & !tied_low) ^ self.reg(Register::IPol, port);
        (iodir & inputs) | (!iodir & self.reg(Register::OLat, port))
    }

    fn read_at(&self, reg: u8) -> u8 {
        let index = reg as usize % REGISTERS;
        if let Some(value) = self.stuck[index] {
            return value;
        }
        match reg {
            0x12 => self.pin_levels(Port::A),
            0x13 => self.pin_levels(Port::B),
            _ => self.regs[index],
        }
    }

    fn write_at(&mut self, reg: u8, value: u8) {
        let index = reg as usize % REGISTERS;
        match reg {
            // IOCON is one register visible at both addresses.
            0x0A | 0x0B => {
                self.regs[0x0A] = value;
                self.regs[0x0B] = value;
            }
            // Writing GPIO writes the latch.
            0x12 | 0x13 => self.regs[index + 2] = value,
            // Flags and captures are read-only.
            0x0E..=0x11 => {}
            _ => self.regs[index] = value,
        }
    }

    fn advance(&mut self) {
        self.pointer = (self.pointer + 1) % REGISTERS as u8;
    }
}

impl Default for SimExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// An I2C bus with up to eight simulated expanders.
#[derive(Clone, Debug, Default)]
pub struct SimBus {
    devices: [Option<SimExpander>; 8],
    fail_next: u32,
    transactions: u32,
    writes: u32,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a powered-on expander at `subaddress`.
    pub fn attach(&mut self, subaddress: u8) {
        self.devices[(subaddress & 0x07) as usize] = Some(SimExpander::new());
    }

    pub fn detach(&mut self, subaddress: u8) {
        self.devices[(subaddress & 0x07) as usize] = None;
    }

    pub fn device(&self, subaddress: u8) -> Option<&SimExpander> {
        self.devices[(subaddress & 0x07) as usize].as_ref()
    }

    fn device_mut(&mut self, subaddress: u8) -> Option<&mut SimExpander> {
        self.devices[(subaddress & 0x07) as usize].as_mut()
    }

    /// Current content of a register as the bus would read it.
    pub fn register(&self, subaddress: u8, reg: u8) -> Option<u8> {
        self.device(subaddress).map(|d| d.read_at(reg))
    }

    /// Make a register always read back `value`.
    pub fn stick(&mut self, subaddress: u8, reg: u8, value: u8) {
        if let Some(device) = self.device_mut(subaddress) {
            device.stuck[reg as usize % REGISTERS] = Some(value);
        }
    }

    /// Fail the next `count` transactions, whatever their address.
    pub fn fail_next(&mut self, count: u32) {
        self.fail_next = count;
    }

    pub fn press(&mut self, subaddress: u8, row: usize, col: usize) {
        if let Some(device) = self.device_mut(subaddress) {
            device.switches[col % 8] |= 1 << (row % 8);
        }
    }

    pub fn release(&mut self, subaddress: u8, row: usize, col: usize) {
        if let Some(device) = self.device_mut(subaddress) {
            device.switches[col % 8] &= !(1 << (row % 8));
        }
    }

    pub fn release_all(&mut self, subaddress: u8) {
        if let Some(device) = self.device_mut(subaddress) {
            device.switches = [0; 8];
        }
    }

    /// Completed and failed transactions so far.
    pub fn transactions(&self) -> u32 {
        self.transactions
    }

    /// Register bytes written so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl i2c::ErrorType for SimBus {
    type Error = SimError;
}

impl i2c::I2c<SevenBitAddress> for SimBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.transactions += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SimError::Injected);
        }
        if address & !0x07 != BASE_ADDRESS {
            return Err(SimError::NoAcknowledge);
        }
        let device = self.devices[(address & 0x07) as usize]
            .as_mut()
            .ok_or(SimError::NoAcknowledge)?;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    device.pointer = *reg % REGISTERS as u8;
                    for value in data {
                        device.write_at(device.pointer, *value);
                        device.advance();
                        self.writes += 1;
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = device.read_at(device.pointer);
                        device.advance();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Millisecond clock advanced by hand.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<u32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// Delay that returns at once and adds up the time it was asked to wait.
#[derive(Debug, Default)]
pub struct SimDelay {
    waited_ns: u64,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waited_us(&self) -> u64 {
        self.waited_ns / 1_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waited_ns += ns as u64;
    }
}

/// Status LED that remembers its level and how often it changed.
#[derive(Debug, Default)]
pub struct SimLed {
    pub on: bool,
    pub toggles: u32,
}

impl digital::ErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.on {
            self.toggles += 1;
        }
        self.on = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.on {
            self.toggles += 1;
        }
        self.on = true;
        Ok(())
    }
}

/// Sink error: the log is full.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SinkFull;

impl embedded_io::Error for SinkFull {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

/// Byte sink collecting everything written to it.
#[derive(Clone, Debug, Default)]
pub struct ByteLog<const N: usize> {
    bytes: heapless::Vec<u8, N>,
}

impl<const N: usize> ByteLog<N> {
    pub fn new() -> Self {
        Self {
            bytes: heapless::Vec::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl<const N: usize> embedded_io::ErrorType for ByteLog<N> {
    type Error = SinkFull;
}

impl<const N: usize> embedded_io::Write for ByteLog<N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let room = N - self.bytes.len();
        if room == 0 {
            return Err(SinkFull);
        }
        let take = room.min(buf.len());
        self.bytes
            .extend_from_slice(&buf[..take])
            .map_err(|_| SinkFull)?;
        Ok(take)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
