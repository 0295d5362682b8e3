//! The periodic tasks of the keyboard: status LED and scan pipeline.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::i2c::{I2c, SevenBitAddress};
use embedded_io::Write;
use log::{debug, info, warn};
use midikbd_keymap::KeyMap;

use crate::config::{Config, MATRIX_SUBADDRESS};
use crate::debounce::Debouncer;
use crate::error::Error;
use crate::events::changes;
use crate::expander::{BringUp, ExpanderPool};
use crate::matrix::{KeyBits, KeyMatrix};
use crate::midi::MidiOut;
use crate::scheduler::Task;

/// Blinks the status LED to show the main loop is alive.
pub struct Heartbeat<P> {
    led: P,
    on: bool,
    period_ms: u32,
}

impl<P: OutputPin> Heartbeat<P> {
    pub fn new(led: P, period_ms: u32) -> Self {
        Self {
            led,
            on: false,
            period_ms,
        }
    }

    pub fn led(&self) -> &P {
        &self.led
    }
}

impl<P: OutputPin> Task for Heartbeat<P> {
    fn period_ms(&self) -> u32 {
        self.period_ms
    }

    fn run(&mut self, _now_ms: u32) {
        self.on = !self.on;
        if let Err(err) = self.led.set_state(PinState::from(self.on)) {
            warn!("heartbeat: LED error {:?}", err);
        }
    }

    fn name(&self) -> &'static str {
        "heartbeat"
    }
}

/// Scan, debounce, dispatch and encode, once per period.
pub struct KeyboardTask<I2C, W, D> {
    pool: ExpanderPool<I2C>,
    matrix: KeyMatrix,
    debouncer: Debouncer,
    midi: MidiOut<W>,
    delay: D,
    config: Config,
    scan_errors: u32,
    send_errors: u32,
}

impl<I2C, W, D> KeyboardTask<I2C, W, D>
where
    I2C: I2c<SevenBitAddress>,
    W: Write,
    D: DelayNs,
{
    /// Bring up the matrix expander and the MIDI output.
    ///
    /// A failed MIDI init is logged and counted; the keyboard still starts.
    pub fn setup(
        i2c: I2C,
        sink: W,
        mut delay: D,
        keymap: &'static KeyMap,
        config: Config,
    ) -> Result<Self, Error<I2C::Error>> {
        let mut pool = ExpanderPool::new(i2c);
        pool.init();
        let device = pool.add_with(MATRIX_SUBADDRESS, &BringUp::MATRIX)?;
        let matrix = KeyMatrix::init(&mut pool, device, keymap, config.settle_us, &mut delay)?;

        let mut task = Self::new(pool, matrix, MidiOut::new(sink), delay, config);
        if let Err(err) = task.midi.init() {
            task.send_errors += 1;
            warn!("keyboard: MIDI init failed: {:?}", err);
        }
        info!("keyboard: ready, channel {}", config.channel);
        Ok(task)
    }

    pub fn new(
        pool: ExpanderPool<I2C>,
        matrix: KeyMatrix,
        midi: MidiOut<W>,
        delay: D,
        config: Config,
    ) -> Self {
        Self {
            pool,
            matrix,
            debouncer: Debouncer::new(config.debounce_threshold),
            midi,
            delay,
            config,
            scan_errors: 0,
            send_errors: 0,
        }
    }

    /// One full cycle. A failed scan leaves the debouncer untouched.
    pub fn cycle(&mut self) -> Result<KeyBits, Error<I2C::Error>> {
        let raw = self.matrix.scan(&mut self.pool, &mut self.delay)?;
        let stable = self.debouncer.update(raw);

        for event in changes(self.debouncer.previous(), stable) {
            debug!("keyboard: key {} {}", event.index, if event.pressed { "down" } else { "up" });
            let sent = self
                .midi
                .send_key_event(event, self.matrix.keymap(), &self.config);
            if let Err(err) = sent {
                self.send_errors += 1;
                warn!("keyboard: MIDI write failed: {:?}", err);
            }
        }
        Ok(stable)
    }

    pub fn scan_errors(&self) -> u32 {
        self.scan_errors
    }

    pub fn send_errors(&self) -> u32 {
        self.send_errors
    }

    pub fn pressed(&self) -> KeyBits {
        self.debouncer.stable()
    }

    pub fn pool(&self) -> &ExpanderPool<I2C> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ExpanderPool<I2C> {
        &mut self.pool
    }

    pub fn midi(&self) -> &MidiOut<W> {
        &self.midi
    }

    pub fn midi_mut(&mut self) -> &mut MidiOut<W> {
        &mut self.midi
    }
}

impl<I2C, W, D> Task for KeyboardTask<I2C, W, D>
where
    I2C: I2c<SevenBitAddress>,
    W: Write,
    D: DelayNs,
{
    fn period_ms(&self) -> u32 {
        self.config.scan_period_ms
    }

    fn run(&mut self, now_ms: u32) {
        if let Err(err) = self.cycle() {
            self.scan_errors = self.scan_errors.saturating_add(1);
            warn!("keyboard: scan at {} ms failed: {} ({} total)", now_ms, err, self.scan_errors);
        }
    }

    fn name(&self) -> &'static str {
        "keyboard"
    }
}
