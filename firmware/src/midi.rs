//! MIDI channel messages, note names and the outgoing byte stream.
//!
//! Every constructor validates its arguments first: a channel outside
//! `1..=16` or a data byte above 127 yields `None`, and nothing reaches
//! the wire.

use embedded_io::Write;
use heapless::Vec;
use log::{debug, info};
use midikbd_keymap::{KeyMap, MAX_NOTE, PITCH_CLASSES};

use crate::config::Config;
use crate::events::KeyEvent;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

/// Controller number of "All Notes Off".
pub const ALL_NOTES_OFF: u8 = 123;

/// Pitch bend value sent for "no bend".
pub const PITCH_BEND_CENTER: u16 = 8192;
const PITCH_BEND_MAX: u16 = 16383;

/// Returned by [`note_name_to_number`] for names that do not parse.
pub const INVALID_NOTE: u8 = 255;

/// One encoded channel message: status byte plus one or two data bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    bytes: Vec<u8, 3>,
}

impl Message {
    fn status(kind: u8, channel: u8) -> Option<u8> {
        if (1..=16).contains(&channel) {
            Some(kind | (channel - 1))
        } else {
            None
        }
    }

    fn data(value: u8) -> Option<u8> {
        (value <= 0x7F).then_some(value)
    }

    fn build(status: u8, data: &[u8]) -> Option<Self> {
        let mut bytes = Vec::new();
        bytes.push(status).ok()?;
        bytes.extend_from_slice(data).ok()?;
        Some(Self { bytes })
    }

    fn three(kind: u8, channel: u8, a: u8, b: u8) -> Option<Self> {
        let status = Self::status(kind, channel)?;
        Self::build(status, &[Self::data(a)?, Self::data(b)?])
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Option<Self> {
        Self::three(NOTE_ON, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Option<Self> {
        Self::three(NOTE_OFF, channel, note, velocity)
    }

    pub fn poly_pressure(channel: u8, note: u8, pressure: u8) -> Option<Self> {
        Self::three(POLY_PRESSURE, channel, note, pressure)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Option<Self> {
        Self::three(CONTROL_CHANGE, channel, controller, value)
    }

    pub fn program_change(channel: u8, program: u8) -> Option<Self> {
        let status = Self::status(PROGRAM_CHANGE, channel)?;
        Self::build(status, &[Self::data(program)?])
    }

    pub fn channel_pressure(channel: u8, pressure: u8) -> Option<Self> {
        let status = Self::status(CHANNEL_PRESSURE, channel)?;
        Self::build(status, &[Self::data(pressure)?])
    }

    /// Signed bend around the center, clamped to the 14-bit range.
    pub fn pitch_bend(channel: u8, value: i16) -> Option<Self> {
        let status = Self::status(PITCH_BEND, channel)?;
        let raw = (value as i32 + PITCH_BEND_CENTER as i32).clamp(0, PITCH_BEND_MAX as i32) as u16;
        Self::build(status, &[(raw & 0x7F) as u8, (raw >> 7) as u8])
    }

    pub fn all_notes_off(channel: u8) -> Option<Self> {
        Self::control_change(channel, ALL_NOTES_OFF, 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Channel 1..=16 the message is addressed to.
    pub fn channel(&self) -> u8 {
        (self.bytes[0] & 0x0F) + 1
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Parse a note name like `C4`, `F#3` or `Bb5` (C4 = 60).
///
/// Flats are read as the sharp of the note below. `Cb`, `Fb`, `E#` and
/// `B#` are rejected, as is anything above note 127.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let bytes = name.as_bytes();
    let (letter, accidental, octave) = match *bytes {
        [letter, octave] => (letter, None, octave),
        [letter, accidental, octave] => (letter, Some(accidental), octave),
        _ => return None,
    };

    let natural: u8 = match letter {
        b'C' => 0,
        b'D' => 2,
        b'E' => 4,
        b'F' => 5,
        b'G' => 7,
        b'A' => 9,
        b'B' => 11,
        _ => return None,
    };
    let semitone = match accidental {
        None => natural,
        Some(b'#') if !matches!(letter, b'E' | b'B') => natural + 1,
        Some(b'b') if !matches!(letter, b'C' | b'F') => natural - 1,
        Some(_) => return None,
    };

    if !octave.is_ascii_digit() {
        return None;
    }
    let note = (octave - b'0' + 1) as u16 * 12 + semitone as u16;
    (note <= MAX_NOTE as u16).then_some(note as u8)
}

/// Like [`parse_note_name`], returning [`INVALID_NOTE`] on failure.
pub fn note_name_to_number(name: &str) -> u8 {
    parse_note_name(name).unwrap_or(INVALID_NOTE)
}

/// Equal-tempered frequency in Hz, A4 = 440. Zero above note 127.
pub fn note_to_frequency(note: u8) -> f32 {
    if note > MAX_NOTE {
        return 0.0;
    }
    440.0 * libm::powf(2.0, (note as f32 - 69.0) / 12.0)
}

/// Display name of a note, sharps only: `C4`, `F#3`, `C-1`.
pub fn note_name(note: u8) -> Option<heapless::String<4>> {
    if note > MAX_NOTE {
        return None;
    }
    let mut name = heapless::String::new();
    name.push_str(PITCH_CLASSES[(note % 12) as usize]).ok()?;
    let octave = (note / 12) as i8 - 1;
    if octave < 0 {
        name.push('-').ok()?;
    }
    name.push((b'0' + octave.unsigned_abs()) as char).ok()?;
    Some(name)
}

/// MIDI output over a byte sink.
///
/// Nothing is written before [`MidiOut::init`].
pub struct MidiOut<W> {
    sink: W,
    ready: bool,
}

impl<W: Write> MidiOut<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, ready: false }
    }

    /// Enable output and silence any note left hanging on channel 1.
    pub fn init(&mut self) -> Result<(), W::Error> {
        self.ready = true;
        info!("midi: output ready");
        self.all_notes_off(1)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Write bytes as they are. No-op before `init` or when empty.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), W::Error> {
        if !self.ready || bytes.is_empty() {
            return Ok(());
        }
        self.sink.write_all(bytes)?;
        self.sink.flush()
    }

    /// Send a message; `None` is silently dropped.
    pub fn send(&mut self, message: Option<Message>) -> Result<(), W::Error> {
        match message {
            Some(message) => {
                debug!("midi: {:02X?}", message.as_bytes());
                self.send_raw(message.as_bytes())
            }
            None => {
                debug!("midi: invalid message dropped");
                Ok(())
            }
        }
    }

    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), W::Error> {
        self.send(Message::note_on(channel, note, velocity))
    }

    pub fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), W::Error> {
        self.send(Message::note_off(channel, note, velocity))
    }

    pub fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<(), W::Error> {
        self.send(Message::control_change(channel, controller, value))
    }

    pub fn program_change(&mut self, channel: u8, program: u8) -> Result<(), W::Error> {
        self.send(Message::program_change(channel, program))
    }

    pub fn pitch_bend(&mut self, channel: u8, value: i16) -> Result<(), W::Error> {
        self.send(Message::pitch_bend(channel, value))
    }

    pub fn poly_pressure(&mut self, channel: u8, note: u8, pressure: u8) -> Result<(), W::Error> {
        self.send(Message::poly_pressure(channel, note, pressure))
    }

    pub fn channel_pressure(&mut self, channel: u8, pressure: u8) -> Result<(), W::Error> {
        self.send(Message::channel_pressure(channel, pressure))
    }

    pub fn all_notes_off(&mut self, channel: u8) -> Result<(), W::Error> {
        self.send(Message::all_notes_off(channel))
    }

    /// Note on for a press, note off for a release. Unmapped keys send nothing.
    pub fn send_key_event(
        &mut self,
        event: KeyEvent,
        keymap: &KeyMap,
        config: &Config,
    ) -> Result<(), W::Error> {
        let Some(note) = keymap.note(event.index as usize) else {
            return Ok(());
        };
        if event.pressed {
            self.note_on(config.channel, note, config.note_on_velocity)
        } else {
            self.note_off(config.channel, note, config.note_off_velocity)
        }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn release(self) -> W {
        self.sink
    }
}
