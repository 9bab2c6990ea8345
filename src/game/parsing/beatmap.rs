//! Reader and in-place patcher for third-party beat charts.
//!
//! These files are JSON text with a `_notes` array of
//! `{_time, _lineIndex, _lineLayer, _type, _cutDirection}` objects (time in
//! beats) and a `_customData._time` field holding the track duration in beats.
//! Patching rewrites only the `_notes` array and leaves every other byte of the
//! file alone.

use crate::game::chart::Chart;
use crate::game::note::{ChartNote, CutDirection, Hand, Lane};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const NOTES_KEY: &str = "\"_notes\"";
pub const KEY_SEPARATOR: &str = ":";
pub const ARRAY_OPEN: &str = "[";
pub const ARRAY_CLOSE: &str = "]";

const TYPE_LEFT: i64 = 0;
const TYPE_RIGHT: i64 = 1;

#[derive(Debug, Error)]
pub enum BeatmapError {
    #[error("invalid beat chart: {0}")]
    Json(#[from] serde_json::Error),
    #[error("section marker {marker} not found")]
    MissingSection { marker: &'static str },
    #[error("patched chart would not parse: {0}")]
    InvalidResult(serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatmapNote {
    #[serde(rename = "_time")]
    pub time: f32,
    #[serde(rename = "_lineIndex")]
    pub line_index: i64,
    #[serde(rename = "_lineLayer")]
    pub line_layer: i64,
    #[serde(rename = "_type")]
    pub note_type: i64,
    #[serde(rename = "_cutDirection")]
    pub cut_direction: i64,
}

#[derive(Debug, Default, Deserialize)]
struct CustomData {
    #[serde(rename = "_time", default)]
    time: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct BeatmapFile {
    #[serde(rename = "_notes")]
    notes: Vec<BeatmapNote>,
    #[serde(rename = "_customData", default)]
    custom_data: Option<CustomData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Beatmap {
    pub notes: Vec<BeatmapNote>,
    pub duration_beats: Option<f32>,
}

#[inline(always)]
pub fn beats_to_seconds(beats: f32, bpm: f32) -> f32 {
    beats * 60.0 / bpm
}

#[inline(always)]
pub fn seconds_to_beats(seconds: f32, bpm: f32) -> f32 {
    seconds * bpm / 60.0
}

pub fn parse(text: &str) -> Result<Beatmap, BeatmapError> {
    let file: BeatmapFile = serde_json::from_str(text)?;
    Ok(Beatmap {
        notes: file.notes,
        duration_beats: file.custom_data.and_then(|c| c.time),
    })
}

/// Converts a parsed beat chart into a native chart at a fixed tempo.
pub fn to_chart(song_name: &str, beatmap: &Beatmap, bpm: f32) -> Chart {
    let mut chart = Chart::new(song_name);
    let mut skipped = 0usize;

    for (i, src) in beatmap.notes.iter().enumerate() {
        let hand = match src.note_type {
            TYPE_LEFT => Hand::Left,
            TYPE_RIGHT => Hand::Right,
            other => {
                debug!("Skipping beat chart note {i} with type {other}");
                skipped += 1;
                continue;
            }
        };

        let lane = Lane::clamped(src.line_layer, src.line_index);
        if i64::from(lane.row) != src.line_layer || i64::from(lane.column) != src.line_index {
            warn!(
                "Beat chart note {i} lane (layer {}, index {}) clamped to row {}, column {}",
                src.line_layer, src.line_index, lane.row, lane.column
            );
        }

        let direction = CutDirection::from_code(src.cut_direction).unwrap_or_else(|| {
            warn!(
                "Beat chart note {i} has unknown cut direction {}; treating as any",
                src.cut_direction
            );
            CutDirection::Any
        });

        chart.notes.push(ChartNote {
            timing: beats_to_seconds(src.time, bpm).max(0.0),
            lane,
            hand,
            approach_rotation: direction.rotation(),
        });
    }

    if skipped > 0 {
        warn!("Skipped {skipped} beat chart notes that are not left/right drums");
    }
    chart.sort_notes();
    chart.song_length = beatmap
        .duration_beats
        .map(|beats| beats_to_seconds(beats, bpm).max(0.0));
    chart
}

pub fn from_chart(chart: &Chart, bpm: f32) -> Vec<BeatmapNote> {
    chart
        .notes
        .iter()
        .map(|note| BeatmapNote {
            time: seconds_to_beats(note.timing, bpm),
            line_index: i64::from(note.lane.column),
            line_layer: i64::from(note.lane.row),
            note_type: if note.hand.is_right() {
                TYPE_RIGHT
            } else {
                TYPE_LEFT
            },
            cut_direction: CutDirection::nearest(note.approach_rotation).code(),
        })
        .collect()
}

fn skip_whitespace(bytes: &[u8], mut at: usize) -> usize {
    while at < bytes.len() && bytes[at].is_ascii_whitespace() {
        at += 1;
    }
    at
}

/// End of the `_notes` key of the top-level object. Keys of nested objects
/// and string values that merely read `"_notes"` are skipped.
fn find_top_level_notes_key(bytes: &[u8]) -> Option<usize> {
    let key = NOTES_KEY.as_bytes();
    let mut depth = 0usize;
    let mut expect_key = false;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_start = 0;
    let mut is_key = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => {
                    in_string = false;
                    if is_key && &bytes[string_start..=i] == key {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                string_start = i;
                is_key = depth == 1 && expect_key;
            }
            b'{' | b'[' => {
                depth += 1;
                if depth == 1 {
                    expect_key = b == b'{';
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 1 => expect_key = true,
            b':' if depth == 1 => expect_key = false,
            _ => {}
        }
    }
    None
}

/// Byte range of the top-level `_notes` array, brackets included.
pub fn locate_notes_array(text: &str) -> Result<RangeInclusive<usize>, BeatmapError> {
    let bytes = text.as_bytes();
    let key_end = find_top_level_notes_key(bytes).ok_or(BeatmapError::MissingSection {
        marker: NOTES_KEY,
    })?;

    let sep = skip_whitespace(bytes, key_end);
    if !text[sep..].starts_with(KEY_SEPARATOR) {
        return Err(BeatmapError::MissingSection {
            marker: KEY_SEPARATOR,
        });
    }
    let open = skip_whitespace(bytes, sep + KEY_SEPARATOR.len());
    if !text[open..].starts_with(ARRAY_OPEN) {
        return Err(BeatmapError::MissingSection { marker: ARRAY_OPEN });
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open..=open + offset);
                }
            }
            _ => {}
        }
    }
    Err(BeatmapError::MissingSection {
        marker: ARRAY_CLOSE,
    })
}

/// Returns `text` with only its `_notes` array replaced by `notes`. The result
/// is checked to still be a well-formed document before it is returned.
pub fn splice_notes(text: &str, notes: &[BeatmapNote]) -> Result<String, BeatmapError> {
    let range = locate_notes_array(text)?;
    let replacement = serde_json::to_string(notes)?;

    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..*range.start()]);
    out.push_str(&replacement);
    out.push_str(&text[*range.end() + 1..]);

    serde_json::from_str::<serde_json::Value>(&out).map_err(BeatmapError::InvalidResult)?;
    Ok(out)
}
