//! MCP23017 I2C I/O expander driver.
//!
//! The keyboard reads its switch matrix through one (or more) MCP23017
//! expanders sharing a single I2C bus. Each chip has two 8-bit ports; every
//! port has its own direction, pull-up, output latch and input register.
//! Pins are addressed by bitmask, so one call can touch several pins.
//!
//! Devices live in a fixed-capacity [`ExpanderPool`] and are addressed by a
//! stable [`DeviceId`]. A device that fails bring-up is marked unusable and
//! its slot is never handed out again until the pool is explicitly reset.

use embedded_hal::digital::PinState;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use log::{debug, error, info, warn};

use crate::error::Error;

/// Fixed family code of the MCP23017 (7-bit address, sub-address 0).
pub const BASE_ADDRESS: u8 = 0x20;

/// Default pool capacity: one slot per possible sub-address.
pub const MAX_DEVICES: usize = 8;

/// 7-bit bus address for a sub-address (A2..A0 pins).
pub const fn bus_address(subaddress: u8) -> SevenBitAddress {
    BASE_ADDRESS | (subaddress & 0x07)
}

/// 8-bit wire form of the address, bit 0 left clear for the R/W flag.
pub const fn wire_address(subaddress: u8) -> u8 {
    (BASE_ADDRESS << 1) | ((subaddress & 0x07) << 1)
}

/// One of the two 8-bit ports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
}

impl Port {
    pub fn other(self) -> Port {
        match self {
            Port::A => Port::B,
            Port::B => Port::A,
        }
    }
}

/// Register kinds. With IOCON.BANK = 0 each kind is an A/B pair at
/// consecutive addresses, so `kind * 2 + port` is the register address
/// (0x00..=0x15).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// I/O direction, 1 = input.
    IoDir = 0,
    /// Input polarity.
    IPol = 1,
    /// Interrupt-on-change enable.
    GpIntEn = 2,
    /// Default compare value for interrupt-on-change.
    DefVal = 3,
    /// Interrupt control.
    IntCon = 4,
    /// Device configuration (shared by both ports).
    IoCon = 5,
    /// Pull-up enable.
    Gppu = 6,
    /// Interrupt flags.
    IntF = 7,
    /// Interrupt capture.
    IntCap = 8,
    /// Input state.
    Gpio = 9,
    /// Output latch.
    OLat = 10,
}

impl Register {
    pub const fn address(self, port: Port) -> u8 {
        (self as u8) * 2 + port as u8
    }
}

/// Pin direction, as stored in IODIR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Output,
    Input,
}

/// Interrupt output polarity (IOCON.INTPOL).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntPolarity {
    ActiveLow,
    ActiveHigh,
}

/// Device configuration register (IOCON) as named fields.
///
/// Bit layout (datasheet): 7 BANK, 6 MIRROR, 5 SEQOP, 4 DISSLW, 3 HAEN,
/// 2 ODR, 1 INTPOL, 0 unimplemented.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Iocon {
    /// Ports in separate register banks. Must stay clear for this driver's
    /// register addressing.
    pub bank: bool,
    /// INTA/INTB internally connected.
    pub mirror: bool,
    /// Sequential addressing disabled.
    pub seqop_disabled: bool,
    /// SDA slew rate control disabled.
    pub slew_rate_disabled: bool,
    /// Hardware address pins enabled (SPI variant only).
    pub haen: bool,
    /// INT pin as open drain.
    pub open_drain: bool,
    pub int_polarity: IntPolarity,
}

impl Iocon {
    const BANK: u8 = 1 << 7;
    const MIRROR: u8 = 1 << 6;
    const SEQOP: u8 = 1 << 5;
    const DISSLW: u8 = 1 << 4;
    const HAEN: u8 = 1 << 3;
    const ODR: u8 = 1 << 2;
    const INTPOL: u8 = 1 << 1;

    /// Power-on configuration: sequential banks, push-pull active-low
    /// interrupt output, everything else off.
    pub const DEFAULT: Iocon = Iocon {
        bank: false,
        mirror: false,
        seqop_disabled: false,
        slew_rate_disabled: false,
        haen: false,
        open_drain: false,
        int_polarity: IntPolarity::ActiveLow,
    };

    pub const fn encode(&self) -> u8 {
        let mut raw = 0;
        if self.bank {
            raw |= Self::BANK;
        }
        if self.mirror {
            raw |= Self::MIRROR;
        }
        if self.seqop_disabled {
            raw |= Self::SEQOP;
        }
        if self.slew_rate_disabled {
            raw |= Self::DISSLW;
        }
        if self.haen {
            raw |= Self::HAEN;
        }
        if self.open_drain {
            raw |= Self::ODR;
        }
        if let IntPolarity::ActiveHigh = self.int_polarity {
            raw |= Self::INTPOL;
        }
        raw
    }

    pub const fn decode(raw: u8) -> Self {
        Self {
            bank: raw & Self::BANK != 0,
            mirror: raw & Self::MIRROR != 0,
            seqop_disabled: raw & Self::SEQOP != 0,
            slew_rate_disabled: raw & Self::DISSLW != 0,
            haen: raw & Self::HAEN != 0,
            open_drain: raw & Self::ODR != 0,
            int_polarity: if raw & Self::INTPOL != 0 {
                IntPolarity::ActiveHigh
            } else {
                IntPolarity::ActiveLow
            },
        }
    }
}

impl Default for Iocon {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Iocon {
    fn from(raw: u8) -> Self {
        Self::decode(raw)
    }
}

impl From<Iocon> for u8 {
    fn from(iocon: Iocon) -> Self {
        iocon.encode()
    }
}

/// Port roles applied when a device is added to the pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BringUp {
    /// Port driven as all-output, latch high. The other port becomes
    /// all-input with pull-ups.
    pub output_port: Port,
    pub iocon: Iocon,
}

impl BringUp {
    /// Columns on port A, rows on port B.
    pub const MATRIX: BringUp = BringUp {
        output_port: Port::A,
        iocon: Iocon::DEFAULT,
    };
}

impl Default for BringUp {
    fn default() -> Self {
        Self::MATRIX
    }
}

/// Stable handle to a pool slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a pool slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Ready,
    /// Bring-up failed; the slot stays claimed until the pool is reset.
    Unusable,
}

#[derive(Copy, Clone, Debug)]
struct Device {
    subaddress: u8,
    address: SevenBitAddress,
    errors: u32,
}

#[derive(Copy, Clone, Debug)]
enum Slot {
    Free,
    Ready(Device),
    Unusable { subaddress: u8 },
}

/// Fixed-capacity registry of expanders on one I2C bus.
pub struct ExpanderPool<I2C, const N: usize = MAX_DEVICES> {
    i2c: I2C,
    slots: [Slot; N],
}

impl<I2C, const N: usize> ExpanderPool<I2C, N>
where
    I2C: I2c<SevenBitAddress>,
{
    /// Create an empty pool owning the bus.
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            slots: [Slot::Free; N],
        }
    }

    /// Forget every device, including unusable ones.
    pub fn init(&mut self) {
        self.slots = [Slot::Free; N];
    }

    /// Mutable access to the underlying bus.
    pub fn bus_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn state(&self, id: DeviceId) -> Option<SlotState> {
        self.slots.get(id.index()).map(|slot| match slot {
            Slot::Free => SlotState::Free,
            Slot::Ready(_) => SlotState::Ready,
            Slot::Unusable { .. } => SlotState::Unusable,
        })
    }

    /// Sub-address of a claimed slot, ready or not.
    pub fn subaddress(&self, id: DeviceId) -> Option<u8> {
        match self.slots.get(id.index())? {
            Slot::Ready(device) => Some(device.subaddress),
            Slot::Unusable { subaddress } => Some(*subaddress),
            Slot::Free => None,
        }
    }

    /// Add the expander wired to `subaddress` with the matrix port layout.
    pub fn add(&mut self, subaddress: u8) -> Result<DeviceId, Error<I2C::Error>> {
        self.add_with(subaddress, &BringUp::MATRIX)
    }

    /// Claim a slot and bring the device up. On any bus failure or readback
    /// mismatch the slot becomes unusable; no retry is attempted.
    pub fn add_with(
        &mut self,
        subaddress: u8,
        bring_up: &BringUp,
    ) -> Result<DeviceId, Error<I2C::Error>> {
        if subaddress > 0x07 {
            warn!("expander: invalid sub-address {}", subaddress);
            return Err(Error::InvalidSubaddress(subaddress));
        }

        let in_use = self
            .slots
            .iter()
            .any(|slot| matches!(slot, Slot::Ready(d) if d.subaddress == subaddress));
        if in_use {
            warn!("expander: sub-address {} already in use", subaddress);
            return Err(Error::AddressInUse(subaddress));
        }

        let Some(index) = self.slots.iter().position(|slot| matches!(slot, Slot::Free)) else {
            warn!("expander: pool full, cannot add sub-address {}", subaddress);
            return Err(Error::PoolFull);
        };

        let address = bus_address(subaddress);
        match configure(&mut self.i2c, address, bring_up) {
            Ok(()) => {
                self.slots[index] = Slot::Ready(Device {
                    subaddress,
                    address,
                    errors: 0,
                });
                info!(
                    "expander: device {} ready at 0x{:02X} (wire 0x{:02X})",
                    index,
                    address,
                    wire_address(subaddress)
                );
                Ok(DeviceId(index as u8))
            }
            Err(err) => {
                self.slots[index] = Slot::Unusable { subaddress };
                match &err {
                    Error::Verify {
                        register,
                        expected,
                        found,
                    } => error!(
                        "expander: bring-up of 0x{:02X} failed, register 0x{:02X} = 0x{:02X} (expected 0x{:02X})",
                        address, register, found, expected
                    ),
                    _ => error!("expander: no response from 0x{:02X}", address),
                }
                Err(err)
            }
        }
    }

    /// Set the direction of the masked pins.
    pub fn set_direction(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
        direction: Direction,
    ) -> Result<(), Error<I2C::Error>> {
        self.modify(id, Register::IoDir, port, mask, direction == Direction::Input)
    }

    /// `Input` if any masked pin is an input.
    pub fn direction(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
    ) -> Result<Direction, Error<I2C::Error>> {
        let value = self.read_register(id, Register::IoDir.address(port))?;
        Ok(if value & mask != 0 {
            Direction::Input
        } else {
            Direction::Output
        })
    }

    /// Drive the masked output latches.
    pub fn set_output(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
        state: PinState,
    ) -> Result<(), Error<I2C::Error>> {
        self.modify(id, Register::OLat, port, mask, state == PinState::High)
    }

    /// `High` if any masked latch bit is set.
    pub fn output(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
    ) -> Result<PinState, Error<I2C::Error>> {
        let value = self.output_port(id, port)?;
        Ok(PinState::from(value & mask != 0))
    }

    /// `High` if any masked pin reads high.
    pub fn input(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
    ) -> Result<PinState, Error<I2C::Error>> {
        let value = self.input_port(id, port)?;
        Ok(PinState::from(value & mask != 0))
    }

    pub fn set_pull_up(
        &mut self,
        id: DeviceId,
        port: Port,
        mask: u8,
        enabled: bool,
    ) -> Result<(), Error<I2C::Error>> {
        self.modify(id, Register::Gppu, port, mask, enabled)
    }

    /// Whether any masked pin has its pull-up enabled.
    pub fn pull_up(&mut self, id: DeviceId, port: Port, mask: u8) -> Result<bool, Error<I2C::Error>> {
        let value = self.read_register(id, Register::Gppu.address(port))?;
        Ok(value & mask != 0)
    }

    /// Whole output latch of a port.
    pub fn output_port(&mut self, id: DeviceId, port: Port) -> Result<u8, Error<I2C::Error>> {
        self.read_register(id, Register::OLat.address(port))
    }

    /// Whole input state of a port.
    pub fn input_port(&mut self, id: DeviceId, port: Port) -> Result<u8, Error<I2C::Error>> {
        self.read_register(id, Register::Gpio.address(port))
    }

    /// Overwrite a port's output latch in one transaction.
    pub fn set_output_port(
        &mut self,
        id: DeviceId,
        port: Port,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_register(id, Register::OLat.address(port), value)
    }

    /// Bus failures seen by a ready device, `None` for any other handle.
    pub fn error_count(&self, id: DeviceId) -> Option<u32> {
        match self.slots.get(id.index())? {
            Slot::Ready(device) => Some(device.errors),
            _ => None,
        }
    }

    pub fn reset_error_count(&mut self, id: DeviceId) -> Result<(), Error<I2C::Error>> {
        self.device_mut(id)?.errors = 0;
        Ok(())
    }

    fn device_mut(&mut self, id: DeviceId) -> Result<&mut Device, Error<I2C::Error>> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Ready(device)) => Ok(device),
            _ => Err(Error::UnknownDevice(id)),
        }
    }

    /// Read-modify-write: set or clear the masked bits of one register.
    /// A failed read leaves the register untouched.
    fn modify(
        &mut self,
        id: DeviceId,
        register: Register,
        port: Port,
        mask: u8,
        set: bool,
    ) -> Result<(), Error<I2C::Error>> {
        let reg = register.address(port);
        let current = self.read_register(id, reg)?;
        let value = if set { current | mask } else { current & !mask };
        self.write_register(id, reg, value)
    }

    fn read_register(&mut self, id: DeviceId, reg: u8) -> Result<u8, Error<I2C::Error>> {
        let device = match self.slots.get_mut(id.index()) {
            Some(Slot::Ready(device)) => device,
            _ => return Err(Error::UnknownDevice(id)),
        };
        let mut buf = [0u8];
        match self.i2c.write_read(device.address, &[reg], &mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(err) => {
                device.errors = device.errors.saturating_add(1);
                warn!(
                    "expander: read of register 0x{:02X} at 0x{:02X} failed ({} errors)",
                    reg, device.address, device.errors
                );
                Err(Error::Bus(err))
            }
        }
    }

    fn write_register(&mut self, id: DeviceId, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        let device = match self.slots.get_mut(id.index()) {
            Some(Slot::Ready(device)) => device,
            _ => return Err(Error::UnknownDevice(id)),
        };
        match self.i2c.write(device.address, &[reg, value]) {
            Ok(()) => Ok(()),
            Err(err) => {
                device.errors = device.errors.saturating_add(1);
                warn!(
                    "expander: write of register 0x{:02X} at 0x{:02X} failed ({} errors)",
                    reg, device.address, device.errors
                );
                Err(Error::Bus(err))
            }
        }
    }
}

/// Bring-up sequence for a freshly claimed device.
fn configure<I2C>(i2c: &mut I2C, address: SevenBitAddress, bring_up: &BringUp) -> Result<(), Error<I2C::Error>>
where
    I2C: I2c<SevenBitAddress>,
{
    let out = bring_up.output_port;
    let inp = out.other();
    let iocon = bring_up.iocon.encode();

    let writes = [
        (Register::IoCon.address(Port::A), iocon),
        (Register::GpIntEn.address(Port::A), 0x00),
        (Register::GpIntEn.address(Port::B), 0x00),
        // Latch high before switching to output so no column glitches low.
        (Register::OLat.address(out), 0xFF),
        (Register::IoDir.address(out), 0x00),
        (Register::Gppu.address(out), 0x00),
        (Register::IoDir.address(inp), 0xFF),
        (Register::Gppu.address(inp), 0xFF),
    ];
    for (reg, value) in writes {
        debug!("expander: 0x{:02X} <- [0x{:02X}] = 0x{:02X}", address, reg, value);
        i2c.write(address, &[reg, value]).map_err(Error::Bus)?;
    }

    let checks = [
        (Register::IoCon.address(Port::A), iocon),
        (Register::IoDir.address(out), 0x00),
        (Register::IoDir.address(inp), 0xFF),
        (Register::Gppu.address(inp), 0xFF),
    ];
    for (reg, expected) in checks {
        let mut buf = [0u8];
        i2c.write_read(address, &[reg], &mut buf)
            .map_err(Error::Bus)?;
        if buf[0] != expected {
            return Err(Error::Verify {
                register: reg,
                expected,
                found: buf[0],
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    fn pool_with_device() -> (ExpanderPool<SimBus>, DeviceId) {
        let mut bus = SimBus::new();
        bus.attach(0);
        let mut pool: ExpanderPool<SimBus> = ExpanderPool::new(bus);
        let id = pool.add(0).unwrap();
        (pool, id)
    }

    #[test]
    fn test_addresses() {
        assert_eq!(bus_address(0), 0x20);
        assert_eq!(bus_address(7), 0x27);
        assert_eq!(wire_address(0), 0x40);
        assert_eq!(wire_address(3), 0x46);
        assert_eq!(wire_address(3), bus_address(3) << 1);
    }

    #[test]
    fn test_register_map() {
        assert_eq!(Register::IoDir.address(Port::A), 0x00);
        assert_eq!(Register::IoDir.address(Port::B), 0x01);
        assert_eq!(Register::IoCon.address(Port::A), 0x0A);
        assert_eq!(Register::Gppu.address(Port::B), 0x0D);
        assert_eq!(Register::Gpio.address(Port::A), 0x12);
        assert_eq!(Register::OLat.address(Port::B), 0x15);
    }

    #[test]
    fn test_iocon_encoding() {
        assert_eq!(Iocon::DEFAULT.encode(), 0x00);
        let iocon = Iocon {
            mirror: true,
            open_drain: true,
            int_polarity: IntPolarity::ActiveHigh,
            ..Iocon::DEFAULT
        };
        assert_eq!(iocon.encode(), 0b0100_0110);
        assert_eq!(Iocon::decode(0b0100_0110), iocon);
        assert!(Iocon::decode(0x80).bank);
        // Bit 0 is unimplemented and ignored.
        assert_eq!(Iocon::decode(0x01), Iocon::DEFAULT);
    }

    #[test]
    fn test_add_configures_ports() {
        let (mut pool, id) = pool_with_device();
        assert_eq!(pool.state(id), Some(SlotState::Ready));
        assert_eq!(pool.direction(id, Port::A, 0xFF).unwrap(), Direction::Output);
        assert_eq!(pool.direction(id, Port::B, 0x01).unwrap(), Direction::Input);
        assert!(pool.pull_up(id, Port::B, 0xFF).unwrap());
        assert!(!pool.pull_up(id, Port::A, 0xFF).unwrap());
        assert_eq!(pool.output_port(id, Port::A).unwrap(), 0xFF);
        assert_eq!(pool.input_port(id, Port::B).unwrap(), 0xFF);
        assert_eq!(pool.error_count(id), Some(0));
    }

    #[test]
    fn test_add_rejects_bad_subaddress() {
        let mut pool: ExpanderPool<SimBus> = ExpanderPool::new(SimBus::new());
        assert_eq!(pool.add(8), Err(Error::InvalidSubaddress(8)));
        assert_eq!(pool.state(DeviceId(0)), Some(SlotState::Free));
    }

    #[test]
    fn test_add_missing_device_marks_slot_unusable() {
        let mut pool: ExpanderPool<SimBus> = ExpanderPool::new(SimBus::new());
        assert!(matches!(pool.add(2), Err(Error::Bus(_))));
        assert_eq!(pool.state(DeviceId(0)), Some(SlotState::Unusable));
        assert_eq!(pool.error_count(DeviceId(0)), None);

        // The failed slot is not reused.
        pool.bus_mut().attach(2);
        let id = pool.add(2).unwrap();
        assert_eq!(id.index(), 1);
        assert_eq!(pool.subaddress(DeviceId(0)), Some(2));
    }

    #[test]
    fn test_add_readback_mismatch() {
        let mut bus = SimBus::new();
        bus.attach(1);
        bus.stick(1, Register::Gppu.address(Port::B), 0x7F);
        let mut pool: ExpanderPool<SimBus> = ExpanderPool::new(bus);
        assert_eq!(
            pool.add(1),
            Err(Error::Verify {
                register: 0x0D,
                expected: 0xFF,
                found: 0x7F
            })
        );
        assert_eq!(pool.state(DeviceId(0)), Some(SlotState::Unusable));
    }

    #[test]
    fn test_pool_exhaustion_and_reset() {
        let mut bus = SimBus::new();
        for sub in 0..3 {
            bus.attach(sub);
        }
        let mut pool: ExpanderPool<SimBus, 2> = ExpanderPool::new(bus);
        pool.add(0).unwrap();
        pool.add(1).unwrap();
        assert_eq!(pool.add(2), Err(Error::PoolFull));

        pool.init();
        assert_eq!(pool.state(DeviceId(0)), Some(SlotState::Free));
        assert_eq!(pool.add(2).unwrap().index(), 0);
    }

    #[test]
    fn test_duplicate_subaddress() {
        let (mut pool, _) = pool_with_device();
        assert_eq!(pool.add(0), Err(Error::AddressInUse(0)));
    }

    #[test]
    fn test_read_modify_write_keeps_other_bits() {
        let (mut pool, id) = pool_with_device();
        pool.set_output(id, Port::A, 0b0000_0101, PinState::Low).unwrap();
        assert_eq!(pool.output_port(id, Port::A).unwrap(), 0b1111_1010);
        assert_eq!(pool.output(id, Port::A, 0b0000_0001).unwrap(), PinState::Low);
        assert_eq!(pool.output(id, Port::A, 0b0000_0011).unwrap(), PinState::High);

        pool.set_direction(id, Port::A, 0b1000_0000, Direction::Input).unwrap();
        assert_eq!(pool.direction(id, Port::A, 0b1000_0000).unwrap(), Direction::Input);
        assert_eq!(pool.direction(id, Port::A, 0b0111_1111).unwrap(), Direction::Output);

        pool.set_pull_up(id, Port::B, 0b0000_0010, false).unwrap();
        assert!(!pool.pull_up(id, Port::B, 0b0000_0010).unwrap());
        assert!(pool.pull_up(id, Port::B, 0b0000_0001).unwrap());
    }

    #[test]
    fn test_failed_read_skips_write() {
        let (mut pool, id) = pool_with_device();
        let writes = pool.bus_mut().writes();
        pool.bus_mut().fail_next(1);
        assert!(matches!(
            pool.set_output(id, Port::A, 0x01, PinState::Low),
            Err(Error::Bus(_))
        ));
        assert_eq!(pool.bus_mut().writes(), writes);
        assert_eq!(pool.output_port(id, Port::A).unwrap(), 0xFF);
        assert_eq!(pool.error_count(id), Some(1));
    }

    #[test]
    fn test_error_accounting() {
        let (mut pool, id) = pool_with_device();
        pool.bus_mut().fail_next(5);
        for _ in 0..5 {
            assert!(pool.input_port(id, Port::B).is_err());
        }
        assert_eq!(pool.error_count(id), Some(5));
        pool.reset_error_count(id).unwrap();
        assert_eq!(pool.error_count(id), Some(0));
        assert!(pool.input_port(id, Port::B).is_ok());
    }

    #[test]
    fn test_invalid_handle() {
        let (mut pool, _) = pool_with_device();
        let bogus = DeviceId(5);
        assert_eq!(pool.error_count(bogus), None);
        assert_eq!(pool.input_port(bogus, Port::B), Err(Error::UnknownDevice(bogus)));
        assert_eq!(pool.reset_error_count(bogus), Err(Error::UnknownDevice(bogus)));
        assert_eq!(pool.state(DeviceId(200)), None);
    }

    #[test]
    fn test_bring_up_with_swapped_ports() {
        let mut bus = SimBus::new();
        bus.attach(4);
        let mut pool: ExpanderPool<SimBus> = ExpanderPool::new(bus);
        let layout = BringUp {
            output_port: Port::B,
            ..BringUp::MATRIX
        };
        let id = pool.add_with(4, &layout).unwrap();
        assert_eq!(pool.direction(id, Port::B, 0xFF).unwrap(), Direction::Output);
        assert_eq!(pool.direction(id, Port::A, 0xFF).unwrap(), Direction::Input);
    }
}
