use crate::model::{
    AnimationData, ConvertOptions, Hand, NoteEvent, ScoreHints, ScoreMeta, DEFAULT_KEY_SIGNATURE,
    DEFAULT_TEMPO_BPM, DEFAULT_TIME_SIGNATURE, UNKNOWN_COMPOSER, UNTITLED,
};
use crate::pitch::{self, PitchError};
use roxmltree::{Document, Node, ParsingOptions};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Raw `<duration>` units per second of animation time.
const DURATION_UNITS_PER_SECOND: f64 = 4.0;
/// Used when a note carries no `<duration>` at all.
const DEFAULT_NOTE_SECONDS: f64 = 0.5;

/// Metronome marks outside this range are treated as unreadable.
const MIN_TEMPO_BPM: f64 = 1.0;
const MAX_TEMPO_BPM: f64 = 1000.0;

const SHARP_KEYS: [&str; 8] = ["C", "G", "D", "A", "E", "B", "F#", "C#"];

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed score: {0}")]
    MalformedScore(String),
}

/// Why a single `<note>` element produced no event. Never escapes the converter.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ElementError {
    #[error("element skipped: {0}")]
    Skipped(String),
    #[error("key number {0} outside piano range")]
    UnsupportedRange(i32),
}

impl From<PitchError> for ElementError {
    fn from(err: PitchError) -> Self {
        match err {
            PitchError::OutOfRange(key) => ElementError::UnsupportedRange(key),
            other => ElementError::Skipped(other.to_string()),
        }
    }
}

#[derive(Debug)]
enum ParsedElement {
    Note(NoteEvent),
    Rest { duration: Option<f64> },
}

pub fn convert_musicxml_path(
    path: &Path,
    hints: &ScoreHints,
    options: &ConvertOptions,
) -> Result<AnimationData, ConvertError> {
    let data = read_musicxml_file(path)?;
    convert_musicxml_str(&data, hints, options)
}

pub fn convert_musicxml_str(
    xml: &str,
    hints: &ScoreHints,
    options: &ConvertOptions,
) -> Result<AnimationData, ConvertError> {
    let doc = parse_document(xml)?;
    Ok(convert_document(&doc, hints, options))
}

/// MusicXML files usually start with a `<!DOCTYPE score-partwise ...>` declaration.
pub fn parse_document(xml: &str) -> Result<Document<'_>, ConvertError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, options)
        .map_err(|e| ConvertError::MalformedScore(e.to_string()))
}

/// Builds animation data from an already parsed score. Individual elements
/// that cannot be interpreted are skipped, so this cannot fail.
pub fn convert_document(
    doc: &Document,
    hints: &ScoreHints,
    options: &ConvertOptions,
) -> AnimationData {
    let metadata = extract_metadata(doc, hints);
    let notes = extract_notes(doc, options);
    tracing::debug!(
        title = %metadata.title,
        composer = %metadata.composer,
        notes = notes.len(),
        "extracted score"
    );

    AnimationData::new(
        metadata,
        notes,
        extract_tempo(doc),
        extract_key_signature(doc),
        extract_time_signature(doc),
    )
}

fn extract_metadata(doc: &Document, hints: &ScoreHints) -> ScoreMeta {
    let title = doc
        .descendants()
        .find(|node| node.has_tag_name("work-title"))
        .and_then(|node| non_blank(node.text()))
        .or_else(|| non_blank(hints.title.as_deref()))
        .unwrap_or(UNTITLED)
        .to_string();

    let composer = doc
        .descendants()
        .find(|node| node.has_tag_name("creator") && node.attribute("type") == Some("composer"))
        .and_then(|node| non_blank(node.text()))
        .or_else(|| non_blank(hints.composer.as_deref()))
        .unwrap_or(UNKNOWN_COMPOSER)
        .to_string();

    ScoreMeta { title, composer }
}

fn extract_notes(doc: &Document, options: &ConvertOptions) -> Vec<NoteEvent> {
    let mut notes = Vec::new();

    let parts = doc
        .descendants()
        .filter(|node| node.is_element() && node.has_tag_name("part"));
    for (part_index, part) in parts.enumerate() {
        // Positional heuristic: first part is the right hand, the rest collapse to left.
        let hand = if part_index == 0 {
            Hand::Right
        } else {
            Hand::Left
        };
        let mut cursor = 0.0_f64;

        for (measure_index, measure) in part
            .children()
            .filter(|node| node.is_element() && node.has_tag_name("measure"))
            .enumerate()
        {
            for element in measure
                .children()
                .filter(|node| node.is_element() && node.has_tag_name("note"))
            {
                match parse_note_element(&element, cursor, hand) {
                    Ok(ParsedElement::Note(event)) => {
                        tracing::trace!(
                            key = event.key_number,
                            name = pitch::key_name(event.key_number).unwrap_or("?"),
                            start = event.start_time,
                            duration = event.duration,
                            "note"
                        );
                        cursor = event.end_time();
                        notes.push(event);
                    }
                    Ok(ParsedElement::Rest { duration }) => {
                        if options.rest_advances_cursor {
                            cursor += duration.unwrap_or(0.0);
                        }
                    }
                    Err(err) => {
                        tracing::debug!(part = part_index, measure = measure_index, %err, "note dropped");
                    }
                }
            }
        }
    }

    notes
}

fn parse_note_element(
    node: &Node,
    start_time: f64,
    hand: Hand,
) -> Result<ParsedElement, ElementError> {
    let duration = parse_duration(node)?;
    if node.children().any(|child| child.has_tag_name("rest")) {
        return Ok(ParsedElement::Rest { duration });
    }

    let key_number = parse_pitch(node)?;
    Ok(ParsedElement::Note(NoteEvent {
        key_number,
        start_time,
        duration: duration.unwrap_or(DEFAULT_NOTE_SECONDS),
        hand,
        finger: parse_fingering(node),
    }))
}

fn parse_pitch(node: &Node) -> Result<u8, ElementError> {
    let pitch = child(node, "pitch").ok_or_else(|| skipped("note has no pitch"))?;
    let step = child_text(&pitch, "step").ok_or_else(|| skipped("pitch has no step"))?;
    let octave = child_text(&pitch, "octave")
        .ok_or_else(|| skipped("pitch has no octave"))?
        .parse::<i32>()
        .map_err(|e| skipped(format!("octave: {e}")))?;
    let alter = match child_text(&pitch, "alter") {
        Some(text) => parse_alter(text)?,
        None => 0,
    };
    Ok(pitch::key_number(step, octave, alter)?)
}

fn parse_alter(text: &str) -> Result<i32, ElementError> {
    if let Ok(value) = text.parse::<i32>() {
        return Ok(value);
    }
    // "-1.0" is a plain flat; microtonal alterations have no key.
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i32),
        _ => Err(skipped(format!("unsupported alter: {text}"))),
    }
}

/// Seconds from `<duration>`; `None` when the element is absent.
fn parse_duration(node: &Node) -> Result<Option<f64>, ElementError> {
    let Some(duration) = child(node, "duration") else {
        return Ok(None);
    };
    let text = duration.text().map(str::trim).unwrap_or("");
    let units = text
        .parse::<f64>()
        .map_err(|_| skipped(format!("non-numeric duration: {text:?}")))?;
    if !units.is_finite() || units < 0.0 {
        return Err(skipped(format!("invalid duration: {text}")));
    }
    Ok(Some(units / DURATION_UNITS_PER_SECOND))
}

fn parse_fingering(node: &Node) -> Option<u8> {
    let text = node
        .descendants()
        .find(|child| child.has_tag_name("fingering"))
        .and_then(|child| child.text())?
        .trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u8>().ok().filter(|finger| (1..=5).contains(finger))
}

fn extract_tempo(doc: &Document) -> i32 {
    doc.descendants()
        .find(|node| node.has_tag_name("per-minute"))
        .and_then(|node| node.text())
        .and_then(|text| text.trim().parse::<f64>().ok())
        .map(f64::trunc)
        .filter(|bpm| (MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(bpm))
        .map(|bpm| bpm as i32)
        .unwrap_or(DEFAULT_TEMPO_BPM)
}

/// Only sharp keys are named; flats and anything else fall back to C.
fn extract_key_signature(doc: &Document) -> String {
    doc.descendants()
        .find(|node| node.has_tag_name("key"))
        .and_then(|key| child_text(&key, "fifths"))
        .and_then(|text| text.parse::<i64>().ok())
        .and_then(|fifths| usize::try_from(fifths).ok())
        .and_then(|index| SHARP_KEYS.get(index).copied())
        .unwrap_or(DEFAULT_KEY_SIGNATURE)
        .to_string()
}

/// Only the first `<time>` counts; without both halves it falls back to 4/4.
fn extract_time_signature(doc: &Document) -> String {
    doc.descendants()
        .find(|node| node.has_tag_name("time"))
        .and_then(|time| {
            let beats = child_text(&time, "beats")?;
            let beat_type = child_text(&time, "beat-type")?;
            Some(format!("{beats}/{beat_type}"))
        })
        .unwrap_or_else(|| DEFAULT_TIME_SIGNATURE.to_string())
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.has_tag_name(name))
}

fn child_text<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

fn skipped(reason: impl Into<String>) -> ElementError {
    ElementError::Skipped(reason.into())
}

fn read_musicxml_file(path: &Path) -> Result<String, ConvertError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("mxl") {
        return read_mxl_archive(path);
    }
    std::fs::read_to_string(path).map_err(|e| ConvertError::Io(e.to_string()))
}

fn read_mxl_archive(path: &Path) -> Result<String, ConvertError> {
    let data = std::fs::read(path).map_err(|e| ConvertError::Io(e.to_string()))?;
    let mut archive = ZipArchive::new(std::io::Cursor::new(data))
        .map_err(|e| ConvertError::MalformedScore(e.to_string()))?;

    let container_xml = if let Ok(mut container) = archive.by_name("META-INF/container.xml") {
        let mut xml = String::new();
        container
            .read_to_string(&mut xml)
            .map_err(|e| ConvertError::Io(e.to_string()))?;
        Some(xml)
    } else {
        None
    };

    if let Some(container_xml) = container_xml {
        if let Ok(doc) = parse_document(&container_xml) {
            if let Some(full_path) = doc
                .descendants()
                .find(|node| node.has_tag_name("rootfile"))
                .and_then(|node| node.attribute("full-path"))
            {
                if let Ok(mut rootfile) = archive.by_name(full_path) {
                    let mut xml = String::new();
                    rootfile
                        .read_to_string(&mut xml)
                        .map_err(|e| ConvertError::Io(e.to_string()))?;
                    return Ok(xml);
                }
            }
        }
    }

    for idx in 0..archive.len() {
        let mut file = archive
            .by_index(idx)
            .map_err(|e| ConvertError::MalformedScore(e.to_string()))?;
        let name = file.name().to_string();
        if name.ends_with(".xml") && !name.starts_with("META-INF/") {
            let mut xml = String::new();
            file.read_to_string(&mut xml)
                .map_err(|e| ConvertError::Io(e.to_string()))?;
            return Ok(xml);
        }
    }

    Err(ConvertError::MalformedScore(
        "mxl archive missing MusicXML payload".to_string(),
    ))
}
