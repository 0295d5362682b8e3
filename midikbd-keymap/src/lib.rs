//! Shared key matrix geometry and note mapping for the MIDI keyboard.
//!
//! This crate is `no_std`-compatible so it can be used by both the
//! firmware and the native CLI tool.

#![no_std]

/// Number of rows in the matrix (one input port).
pub const ROWS: usize = 8;
/// Number of columns in the matrix (one output port).
pub const COLS: usize = 8;
/// Total number of cells in the matrix.
pub const KEYS: usize = ROWS * COLS;

/// Note number of a cell with no note attached.
pub const NO_NOTE: u8 = 0xFF;

/// Highest valid MIDI note number.
pub const MAX_NOTE: u8 = 127;

/// Pitch class names, sharps only, starting at C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One matrix cell: the note it plays and the label shown for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Key {
    pub note: u8,
    pub label: &'static str,
}

impl Key {
    /// A cell that plays nothing.
    pub const UNUSED: Key = Key {
        note: NO_NOTE,
        label: "",
    };

    /// Key playing `note`, labelled with its pitch class.
    pub const fn note(note: u8) -> Self {
        if note > MAX_NOTE {
            return Key::UNUSED;
        }
        Key {
            note,
            label: PITCH_CLASSES[(note % 12) as usize],
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.note <= MAX_NOTE
    }

    /// Whether this key is a "black" key on a piano.
    pub fn is_sharp(&self) -> bool {
        self.label.ends_with('#')
    }
}

/// Immutable cell → note table, indexed by `row * COLS + col`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMap {
    keys: [Key; KEYS],
}

impl KeyMap {
    pub const fn new(keys: [Key; KEYS]) -> Self {
        Self { keys }
    }

    /// Consecutive semitones from `base`, row by row.
    /// Cells past note 127 are left unused.
    pub const fn chromatic(base: u8) -> Self {
        let mut keys = [Key::UNUSED; KEYS];
        let mut i = 0;
        while i < KEYS {
            let note = base as usize + i;
            if note <= MAX_NOTE as usize {
                keys[i] = Key::note(note as u8);
            }
            i += 1;
        }
        Self { keys }
    }

    pub fn key(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    /// Note for a cell, `None` if the cell is out of range or unmapped.
    pub fn note(&self, index: usize) -> Option<u8> {
        self.key(index).filter(|k| k.is_mapped()).map(|k| k.note)
    }

    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.key(index).map(|k| k.label)
    }

    pub fn keys(&self) -> &[Key; KEYS] {
        &self.keys
    }
}

/// Default layout: an 8×8 chromatic piano starting at C3 (note 48).
///
/// Row 0 holds C3..G3, row 1 G#3..D#4, and so on up to D#8 (note 111)
/// in the last cell.
pub static PIANO: KeyMap = KeyMap::chromatic(48);

/// Linear cell index of a matrix position.
pub const fn index(row: usize, col: usize) -> usize {
    row * COLS + col
}

/// Matrix position `(row, col)` of a linear cell index.
pub const fn position(index: usize) -> (usize, usize) {
    (index / COLS, index % COLS)
}

/// Pitch class name and octave of a note (C4 = 60), `None` above 127.
pub fn pitch(note: u8) -> Option<(&'static str, i8)> {
    if note > MAX_NOTE {
        return None;
    }
    Some((PITCH_CLASSES[(note % 12) as usize], (note / 12) as i8 - 1))
}
