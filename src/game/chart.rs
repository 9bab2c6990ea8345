use crate::game::note::ChartNote;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub song_name: String,
    #[serde(default)]
    pub notes: Vec<ChartNote>,
    /// Track length in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_length: Option<f32>,
}

impl Chart {
    pub fn new(song_name: impl Into<String>) -> Self {
        Self {
            song_name: song_name.into(),
            notes: Vec::new(),
            song_length: None,
        }
    }

    /// Stable ascending sort by timing; simultaneous notes keep their order.
    pub fn sort_notes(&mut self) {
        self.notes.sort_by(|a, b| a.timing.total_cmp(&b.timing));
    }

    /// Inserts after any notes with the same timing, keeping the chart sorted.
    pub fn add_note(&mut self, note: ChartNote) {
        let at = self.notes.partition_point(|n| n.timing <= note.timing);
        self.notes.insert(at, note);
    }

    pub fn clear_notes(&mut self) {
        self.notes.clear();
    }

    #[inline(always)]
    pub fn is_sorted(&self) -> bool {
        self.notes.windows(2).all(|w| w[0].timing <= w[1].timing)
    }

    pub fn last_timing(&self) -> Option<f32> {
        self.notes.last().map(|n| n.timing)
    }

    /// Describes the first note that cannot be played, if any.
    pub fn validate(&self) -> Result<(), String> {
        for (i, note) in self.notes.iter().enumerate() {
            if !note.timing.is_finite() || note.timing < 0.0 {
                return Err(format!("note {i} has invalid timing {}", note.timing));
            }
            if !note.lane.is_valid() {
                return Err(format!(
                    "note {i} has lane out of range (row {}, column {})",
                    note.lane.row, note.lane.column
                ));
            }
            if !note.approach_rotation.is_finite() {
                return Err(format!("note {i} has a non-finite rotation"));
            }
        }
        if let Some(length) = self.song_length
            && (!length.is_finite() || length < 0.0)
        {
            return Err(format!("invalid song length {length}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Chart;
    use crate::game::note::{ChartNote, Hand, Lane};

    fn note(t: f32, hand: Hand) -> ChartNote {
        ChartNote::new(t, Lane::new(0, 0).unwrap(), hand)
    }

    #[test]
    fn add_note_keeps_order_and_simultaneous_notes() {
        let mut chart = Chart::new("song");
        chart.add_note(note(2.0, Hand::Left));
        chart.add_note(note(1.0, Hand::Left));
        chart.add_note(note(2.0, Hand::Right));
        let timings: Vec<f32> = chart.notes.iter().map(|n| n.timing).collect();
        assert_eq!(timings, vec![1.0, 2.0, 2.0]);
        assert_eq!(chart.notes[1].hand, Hand::Left, "earlier insert stays first");
        assert_eq!(chart.notes[2].hand, Hand::Right);
        assert!(chart.is_sorted());
    }

    #[test]
    fn validate_rejects_bad_notes() {
        let mut chart = Chart::new("song");
        chart.notes.push(note(-1.0, Hand::Left));
        assert!(chart.validate().is_err());
        chart.notes[0].timing = 1.0;
        chart.notes[0].lane.row = 9;
        assert!(chart.validate().is_err());
        chart.notes[0].lane.row = 3;
        assert!(chart.validate().is_ok());
    }
}
