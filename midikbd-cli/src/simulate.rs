//! Run the firmware pipeline against the simulated expander.
//!
//! The scheduler drives the real heartbeat and keyboard tasks; a script
//! player wrapped around the keyboard task flips simulated switches
//! before each scan and timestamps whatever MIDI comes out.

use std::convert::Infallible;
use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use firmware::midi::{note_name, NOTE_OFF, NOTE_ON};
use firmware::scheduler::{Clock, Scheduler, Task};
use firmware::sim::{SimBus, SimClock, SimDelay, SimLed};
use firmware::{Config, Heartbeat, KeyboardTask};
use log::info;
use midikbd_keymap::KeyMap;

use crate::script::{Action, Step};

/// Byte sink backed by a growable buffer.
#[derive(Debug, Default)]
pub struct Capture {
    bytes: Vec<u8>,
}

impl embedded_io::ErrorType for Capture {
    type Error = Infallible;
}

impl embedded_io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

type Keyboard = KeyboardTask<SimBus, Capture, SimDelay>;

/// MIDI bytes emitted during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub at_ms: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Report {
    pub outputs: Vec<Output>,
    pub led_toggles: u32,
    pub scan_errors: u32,
    pub end_ms: u32,
}

struct Player<'s> {
    keyboard: Keyboard,
    steps: &'s [Step],
    next: usize,
    seen: usize,
    outputs: Vec<Output>,
}

impl Player<'_> {
    fn apply_due(&mut self, now_ms: u32) {
        while let Some(step) = self.steps.get(self.next) {
            if step.at_ms > now_ms {
                break;
            }
            let bus = self.keyboard.pool_mut().bus_mut();
            match step.action {
                Action::Press => bus.press(0, step.row, step.col),
                Action::Release => bus.release(0, step.row, step.col),
            }
            self.next += 1;
        }
    }
}

impl Task for Player<'_> {
    fn period_ms(&self) -> u32 {
        self.keyboard.period_ms()
    }

    fn run(&mut self, now_ms: u32) {
        self.apply_due(now_ms);
        self.keyboard.run(now_ms);

        let bytes = &self.keyboard.midi().sink().bytes;
        if bytes.len() > self.seen {
            self.outputs.push(Output {
                at_ms: now_ms,
                bytes: bytes[self.seen..].to_vec(),
            });
            self.seen = bytes.len();
        }
    }

    fn name(&self) -> &'static str {
        "player"
    }
}

/// Play `steps`, then keep scanning for `tail_ms` so releases settle.
pub fn run(
    steps: &[Step],
    keymap: &'static KeyMap,
    config: Config,
    tail_ms: u32,
) -> Result<Report> {
    config.validate().map_err(|err| anyhow!("invalid settings: {err}"))?;

    let mut bus = SimBus::new();
    bus.attach(firmware::config::MATRIX_SUBADDRESS);
    let keyboard = KeyboardTask::setup(bus, Capture::default(), SimDelay::new(), keymap, config)
        .map_err(|err| anyhow!("keyboard bring-up failed: {err}"))?;

    // Bring-up output (all notes off) is reported at tick 0.
    let startup = keyboard.midi().sink().bytes.clone();
    let mut player = Player {
        keyboard,
        steps,
        next: 0,
        seen: startup.len(),
        outputs: Vec::new(),
    };
    if !startup.is_empty() {
        player.outputs.push(Output {
            at_ms: 0,
            bytes: startup,
        });
    }

    let mut heartbeat = Heartbeat::new(SimLed::default(), config.heartbeat_period_ms);
    let end_ms = steps.last().map_or(0, |s| s.at_ms).saturating_add(tail_ms);
    let clock = SimClock::new();

    {
        let mut scheduler: Scheduler<'_, 2> = Scheduler::new();
        scheduler
            .add(&mut heartbeat)
            .map_err(|_| anyhow!("scheduler full"))?;
        scheduler
            .add(&mut player)
            .map_err(|_| anyhow!("scheduler full"))?;

        while clock.now_ms() <= end_ms {
            scheduler.poll(clock.now_ms());
            clock.advance(config.idle_ms.max(1));
        }
    }

    info!("simulation: {} ms, {} outputs", end_ms, player.outputs.len());
    Ok(Report {
        led_toggles: heartbeat.led().toggles,
        scan_errors: player.keyboard.scan_errors(),
        outputs: player.outputs,
        end_ms,
    })
}

/// Split a byte run into messages at each status byte.
pub fn messages(bytes: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=bytes.len() {
        if i == bytes.len() || bytes[i] & 0x80 != 0 {
            out.push(&bytes[start..i]);
            start = i;
        }
    }
    out
}

/// Human-readable form of one channel message.
pub fn describe(message: &[u8]) -> String {
    let Some((&status, data)) = message.split_first() else {
        return String::new();
    };
    let channel = (status & 0x0F) + 1;
    let mut text = String::new();
    match (status & 0xF0, data) {
        (kind @ (NOTE_ON | NOTE_OFF), &[note, velocity]) => {
            let what = if kind == NOTE_ON { "note on " } else { "note off" };
            let name = note_name(note).map(|n| n.to_string()).unwrap_or_default();
            let _ = write!(text, "{what} ch {channel:>2} {name:<4} ({note}) vel {velocity}");
        }
        (0xB0, &[controller, value]) => {
            let _ = write!(text, "control  ch {channel:>2} #{controller} = {value}");
        }
        _ => {
            let _ = write!(text, "status 0x{status:02X} ch {channel:>2} {data:?}");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use midikbd_keymap::PIANO;

    #[test]
    fn test_press_and_release() {
        let steps = parse_script("0 press 1 4\n200 release 1 4").unwrap();
        let report = run(&steps, &PIANO, Config::default(), 100).unwrap();

        let bytes: Vec<u8> = report.outputs.iter().flat_map(|o| o.bytes.clone()).collect();
        assert_eq!(bytes, vec![0xB0, 0x7B, 0x00, 0x90, 60, 100, 0x80, 60, 0]);
        assert_eq!(report.outputs.len(), 3);
        // Three scans at 10 ms each before the press is stable.
        assert_eq!(report.outputs[1].at_ms, 30);
        assert_eq!(report.scan_errors, 0);
    }

    #[test]
    fn test_short_tap_is_filtered() {
        // Held for less than three scans.
        let steps = parse_script("5 press 0 0\n15 release 0 0").unwrap();
        let report = run(&steps, &PIANO, Config::default(), 100).unwrap();
        assert_eq!(report.outputs.len(), 1);
    }

    #[test]
    fn test_heartbeat_runs() {
        let report = run(&[], &PIANO, Config::default(), 2500).unwrap();
        assert_eq!(report.led_toggles, 2);
    }

    #[test]
    fn test_invalid_config() {
        let config = Config {
            channel: 0,
            ..Config::default()
        };
        assert!(run(&[], &PIANO, config, 10).is_err());
    }

    #[test]
    fn test_messages_and_describe() {
        let bytes = [0x90, 60, 100, 0x80, 60, 0, 0xB0, 123, 0];
        let split = messages(&bytes);
        assert_eq!(split.len(), 3);
        assert_eq!(describe(split[0]), "note on  ch  1 C4   (60) vel 100");
        assert_eq!(describe(split[1]), "note off ch  1 C4   (60) vel 0");
        assert_eq!(describe(split[2]), "control  ch  1 #123 = 0");
    }
}
