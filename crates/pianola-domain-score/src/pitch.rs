use once_cell::sync::Lazy;

pub const PIANO_LOWEST_KEY: i32 = 21;
pub const PIANO_HIGHEST_KEY: i32 = 108;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

static KEY_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    (PIANO_LOWEST_KEY..=PIANO_HIGHEST_KEY)
        .map(|key| {
            let octave = (key - 12) / 12;
            let index = ((key - 12) % 12) as usize;
            format!("{}{}", NOTE_NAMES[index], octave)
        })
        .collect()
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PitchError {
    #[error("unknown step: {0}")]
    UnknownStep(String),
    #[error("key number {0} outside piano range")]
    OutOfRange(i32),
}

/// Key number of `step` in octave 4.
pub fn step_base(step: &str) -> Option<i32> {
    let base = match step {
        "C" => 60,
        "D" => 62,
        "E" => 64,
        "F" => 65,
        "G" => 67,
        "A" => 69,
        "B" => 71,
        _ => return None,
    };
    Some(base)
}

/// Maps a spelled pitch to a piano key number (MIDI numbering, 21..=108).
pub fn key_number(step: &str, octave: i32, alter: i32) -> Result<u8, PitchError> {
    let base = step_base(step).ok_or_else(|| PitchError::UnknownStep(step.to_string()))?;
    let key = octave
        .saturating_sub(4)
        .saturating_mul(12)
        .saturating_add(base)
        .saturating_add(alter);
    if !(PIANO_LOWEST_KEY..=PIANO_HIGHEST_KEY).contains(&key) {
        return Err(PitchError::OutOfRange(key));
    }
    Ok(key as u8)
}

/// Display name such as `"A0"` or `"C#4"`; `None` off the keyboard.
pub fn key_name(key: u8) -> Option<&'static str> {
    let offset = i32::from(key).checked_sub(PIANO_LOWEST_KEY)?;
    KEY_NAMES.get(offset as usize).map(String::as_str)
}
