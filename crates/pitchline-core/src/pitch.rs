//! Pitch value object and note math.
//!
//! Notes are identified by MIDI number with A4 = 440 Hz = MIDI 69.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Lowest representable pitch (half a semitone below MIDI 0).
pub const MIN_FREQUENCY: f64 = 7.943_049;
/// Highest representable pitch (half a semitone above MIDI 127).
pub const MAX_FREQUENCY: f64 = 12_911.117;

/// Speed of sound in dry air at 20 °C, m/s.
pub const SPEED_OF_SOUND: f64 = 343.0;

/// A note of the equal-tempered scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    midi: u8,
}

impl Note {
    /// Returns `None` above MIDI 127.
    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi <= 127).then_some(Self { midi })
    }

    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Octave in scientific pitch notation (C4 = middle C).
    pub fn octave(&self) -> i32 {
        (self.midi / 12) as i32 - 1
    }

    /// Name with sharp notation (e.g. "A4", "C#5").
    pub fn name(&self) -> String {
        format!("{}{}", SHARP_NAMES[(self.midi % 12) as usize], self.octave())
    }

    /// Name with flat notation (e.g. "A4", "Db5").
    pub fn name_flat(&self) -> String {
        format!("{}{}", FLAT_NAMES[(self.midi % 12) as usize], self.octave())
    }

    /// Exact equal-tempered frequency of this note.
    pub fn frequency(&self) -> f64 {
        midi_to_freq(self.midi)
    }
}

/// A detected pitch.
///
/// Construct with [`Pitch::new`]; the derived attributes are computed once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    frequency: f64,
    note: Note,
    cents_offset: f64,
}

impl Pitch {
    pub fn new(frequency: f64) -> Result<Self> {
        if !frequency.is_finite() || !(MIN_FREQUENCY..MAX_FREQUENCY).contains(&frequency) {
            return Err(Error::InvalidFrequency(frequency));
        }

        let (midi, cents_offset) = freq_to_midi(frequency);
        let note = Note::from_midi(midi).ok_or(Error::InvalidFrequency(frequency))?;

        Ok(Self {
            frequency,
            note,
            cents_offset,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Nearest note.
    pub fn note(&self) -> Note {
        self.note
    }

    /// Deviation from [`Pitch::note`] in cents (-50 to +50).
    pub fn cents_offset(&self) -> f64 {
        self.cents_offset
    }

    /// Wave length in metres for the given speed of sound.
    pub fn wave_length(&self, speed_of_sound: f64) -> f64 {
        speed_of_sound / self.frequency
    }
}

/// Convert frequency to MIDI note and cents offset.
///
/// Notes are clamped to 0..=127; callers that need strict range checks
/// should go through [`Pitch::new`].
pub fn freq_to_midi(freq: f64) -> (u8, f64) {
    if freq <= 0.0 {
        return (0, 0.0);
    }

    let note_float = 69.0 + 12.0 * (freq / 440.0).log2();
    let note = (note_float.round() as i32).clamp(0, 127) as u8;
    let cents = 1200.0 * (freq / midi_to_freq(note)).log2();

    (note, cents)
}

/// Convert MIDI note to frequency.
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2.0f64.powf((note as f64 - 69.0) / 12.0)
}
