//! Pitch table — note names to frequencies.
//!
//! Names follow `<A-G>[#]<octave>` and cover C2 through C6 chromatically.
//! Anything outside the table resolves to `None`; callers treat that as
//! "skip this note", never as a failure.

/// Equal-tempered frequencies (A4 = 440 Hz), rounded to 0.01 Hz.
#[rustfmt::skip]
pub static PITCH_TABLE: [(&str, f64); 49] = [
    ("C2", 65.41), ("C#2", 69.30), ("D2", 73.42), ("D#2", 77.78), ("E2", 82.41),
    ("F2", 87.31), ("F#2", 92.50), ("G2", 98.00), ("G#2", 103.83), ("A2", 110.00),
    ("A#2", 116.54), ("B2", 123.47),
    ("C3", 130.81), ("C#3", 138.59), ("D3", 146.83), ("D#3", 155.56), ("E3", 164.81),
    ("F3", 174.61), ("F#3", 185.00), ("G3", 196.00), ("G#3", 207.65), ("A3", 220.00),
    ("A#3", 233.08), ("B3", 246.94),
    ("C4", 261.63), ("C#4", 277.18), ("D4", 293.66), ("D#4", 311.13), ("E4", 329.63),
    ("F4", 349.23), ("F#4", 369.99), ("G4", 392.00), ("G#4", 415.30), ("A4", 440.00),
    ("A#4", 466.16), ("B4", 493.88),
    ("C5", 523.25), ("C#5", 554.37), ("D5", 587.33), ("D#5", 622.25), ("E5", 659.25),
    ("F5", 698.46), ("F#5", 739.99), ("G5", 783.99), ("G#5", 830.61), ("A5", 880.00),
    ("A#5", 932.33), ("B5", 987.77),
    ("C6", 1046.50),
];

/// Resolve a note name (e.g. "C#4") to its frequency in Hz.
pub fn frequency(name: &str) -> Option<f64> {
    if !is_well_formed(name) {
        return None;
    }
    PITCH_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, freq)| freq)
}

/// Check the `<A-G>[#]<digit>` grammar without consulting the table.
pub fn is_well_formed(name: &str) -> bool {
    match name.as_bytes() {
        [letter, octave] => is_letter(*letter) && octave.is_ascii_digit(),
        [letter, b'#', octave] => is_letter(*letter) && octave.is_ascii_digit(),
        _ => false,
    }
}

fn is_letter(b: u8) -> bool {
    (b'A'..=b'G').contains(&b)
}
