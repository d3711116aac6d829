use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPO_BPM: i32 = 120;
pub const DEFAULT_KEY_SIGNATURE: &str = "C";
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";
pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_COMPOSER: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreMeta {
    pub title: String,
    pub composer: String,
}

/// One timed key press.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "midi")]
    pub key_number: u8,
    #[serde(rename = "start")]
    pub start_time: f64,
    pub duration: f64,
    pub hand: Hand,
    pub finger: Option<u8>,
}

impl NoteEvent {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    pub metadata: ScoreMeta,
    pub notes: Vec<NoteEvent>,
    pub duration: f64,
    pub tempo: i32,
    #[serde(rename = "keySignature")]
    pub key_signature: String,
    #[serde(rename = "timeSignature")]
    pub time_signature: String,
    pub generated_at: DateTime<Utc>,
}

/// Caller supplied fallbacks used when the document carries no title or composer.
#[derive(Clone, Debug, Default)]
pub struct ScoreHints {
    pub title: Option<String>,
    pub composer: Option<String>,
}

impl ScoreHints {
    pub fn new(title: Option<String>, composer: Option<String>) -> Self {
        Self { title, composer }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Advance the part cursor over rests. Off by default: only emitted notes
    /// move the cursor.
    #[serde(default)]
    pub rest_advances_cursor: bool,
}

impl AnimationData {
    pub fn new(
        metadata: ScoreMeta,
        mut notes: Vec<NoteEvent>,
        tempo: i32,
        key_signature: String,
        time_signature: String,
    ) -> Self {
        // Stable: events sharing a start keep part order.
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let duration = total_duration(&notes);
        Self {
            metadata,
            notes,
            duration,
            tempo,
            key_signature,
            time_signature,
            generated_at: Utc::now(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

pub fn total_duration(notes: &[NoteEvent]) -> f64 {
    notes
        .iter()
        .map(NoteEvent::end_time)
        .reduce(f64::max)
        .unwrap_or(0.0)
}
