mod layout;
mod script;
mod simulate;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use firmware::midi::{self, Message};
use firmware::Config;
use midikbd_keymap::PIANO;
use std::fs;

#[derive(Parser)]
#[command(name = "midikbd")]
#[command(about = "Host tools for the MIDI keyboard firmware")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show MIDI number and frequency of notes given by name or number
    Note {
        #[arg(required = true)]
        notes: Vec<String>,
    },
    /// Print the bytes of a channel message
    Encode {
        /// MIDI channel, 1-16
        #[arg(short, long, default_value_t = firmware::config::MIDI_CHANNEL)]
        channel: u8,
        #[command(subcommand)]
        kind: Encode,
    },
    /// Run a key script through the firmware against a simulated expander
    Simulate {
        /// Script file, one `<tick_ms> press|release <row> <col>` per line
        script: String,
        #[command(flatten)]
        settings: Settings,
        /// Keep scanning this long after the last step
        #[arg(long, default_value_t = 100)]
        tail_ms: u32,
    },
    /// Render the note map as an HTML page
    Layout {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
enum Encode {
    NoteOn {
        /// Note name (C4, F#3, Bb5) or number
        note: String,
        #[arg(default_value_t = firmware::config::NOTE_ON_VELOCITY)]
        velocity: u8,
    },
    NoteOff {
        note: String,
        #[arg(default_value_t = firmware::config::NOTE_OFF_VELOCITY)]
        velocity: u8,
    },
    Cc {
        controller: u8,
        value: u8,
    },
    Program {
        program: u8,
    },
    /// Signed bend, -8192..=8191
    Bend {
        #[arg(allow_negative_numbers = true)]
        value: i16,
    },
    Pressure {
        value: u8,
    },
    AllNotesOff,
}

#[derive(Args)]
struct Settings {
    /// Scans a change must persist before it counts
    #[arg(long, default_value_t = firmware::config::DEBOUNCE_THRESHOLD)]
    threshold: u8,
    #[arg(long, default_value_t = firmware::config::SCAN_PERIOD_MS)]
    scan_period_ms: u32,
    /// Column settle time
    #[arg(long, default_value_t = firmware::config::SETTLE_DELAY_US)]
    settle_us: u32,
    #[arg(short, long, default_value_t = firmware::config::MIDI_CHANNEL)]
    channel: u8,
    /// Note on velocity
    #[arg(long, default_value_t = firmware::config::NOTE_ON_VELOCITY)]
    velocity: u8,
}

impl Settings {
    fn config(&self) -> Config {
        Config {
            debounce_threshold: self.threshold,
            scan_period_ms: self.scan_period_ms,
            settle_us: self.settle_us,
            channel: self.channel,
            note_on_velocity: self.velocity,
            ..Config::default()
        }
    }
}

/// Accept either a note name or a plain number.
fn parse_note(text: &str) -> Result<u8> {
    if let Ok(number) = text.parse::<u8>() {
        if number > midikbd_keymap::MAX_NOTE {
            bail!("note {} above 127", number);
        }
        return Ok(number);
    }
    midi::parse_note_name(text).with_context(|| format!("invalid note name {:?}", text))
}

fn encode(channel: u8, kind: &Encode) -> Result<Option<Message>> {
    Ok(match *kind {
        Encode::NoteOn { ref note, velocity } => Message::note_on(channel, parse_note(note)?, velocity),
        Encode::NoteOff { ref note, velocity } => {
            Message::note_off(channel, parse_note(note)?, velocity)
        }
        Encode::Cc { controller, value } => Message::control_change(channel, controller, value),
        Encode::Program { program } => Message::program_change(channel, program),
        Encode::Bend { value } => Message::pitch_bend(channel, value),
        Encode::Pressure { value } => Message::channel_pressure(channel, value),
        Encode::AllNotesOff => Message::all_notes_off(channel),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Note { notes } => {
            for text in &notes {
                let note = parse_note(text)?;
                let name = midi::note_name(note).map(|n| n.to_string()).unwrap_or_default();
                println!(
                    "{:<5} {:>3}  {:>9.2} Hz",
                    name,
                    note,
                    midi::note_to_frequency(note)
                );
            }
        }
        Command::Encode { channel, kind } => {
            let Some(message) = encode(channel, &kind)? else {
                bail!("value out of range (channel 1-16, data 0-127)");
            };
            let hex: Vec<String> = message
                .as_bytes()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect();
            println!("{}", hex.join(" "));
        }
        Command::Simulate {
            script,
            settings,
            tail_ms,
        } => {
            let contents =
                fs::read_to_string(&script).with_context(|| format!("reading {}", script))?;
            let steps = script::parse_script(&contents).context("parsing key script")?;

            let report = simulate::run(&steps, &PIANO, settings.config(), tail_ms)?;
            for output in &report.outputs {
                for message in simulate::messages(&output.bytes) {
                    let hex: Vec<String> = message.iter().map(|b| format!("{:02X}", b)).collect();
                    println!(
                        "{:>7} ms  {:<9}  {}",
                        output.at_ms,
                        hex.join(" "),
                        simulate::describe(message)
                    );
                }
            }
            println!(
                "Simulated {} ms: {} scan errors, LED toggled {} times",
                report.end_ms, report.scan_errors, report.led_toggles
            );
        }
        Command::Layout { output } => {
            let html = layout::generate_html(&PIANO);
            match output {
                Some(path) => {
                    fs::write(&path, html).with_context(|| format!("writing {}", path))?;
                    println!("Layout written to {}", path);
                }
                None => print!("{}", html),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("60").unwrap(), 60);
        assert_eq!(parse_note("C4").unwrap(), 60);
        assert_eq!(parse_note("Bb5").unwrap(), 82);
        assert!(parse_note("128").is_err());
        assert!(parse_note("H2").is_err());
    }

    #[test]
    fn test_encode() {
        let on = encode(1, &Encode::NoteOn {
            note: "C4".into(),
            velocity: 100,
        })
        .unwrap()
        .unwrap();
        assert_eq!(on.as_bytes(), &[0x90, 0x3C, 0x64]);

        let bend = encode(1, &Encode::Bend { value: -8192 }).unwrap().unwrap();
        assert_eq!(bend.as_bytes(), &[0xE0, 0x00, 0x00]);

        assert!(encode(17, &Encode::AllNotesOff).unwrap().is_none());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["midikbd", "encode", "-c", "2", "bend", "-100"]);
        assert!(matches!(
            cli.command,
            Command::Encode {
                channel: 2,
                kind: Encode::Bend { value: -100 }
            }
        ));
    }
}
