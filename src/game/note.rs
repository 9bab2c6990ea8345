use glam::Vec3;
use serde::{Deserialize, Serialize};

pub const LANE_ROWS: usize = 4;
pub const LANE_COLUMNS: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    #[inline(always)]
    pub const fn is_right(self) -> bool {
        matches!(self, Self::Right)
    }

    #[inline(always)]
    pub const fn from_is_right(is_right: bool) -> Self {
        if is_right { Self::Right } else { Self::Left }
    }
}

impl core::fmt::Display for Hand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Left => "Left",
            Self::Right => "Right",
        })
    }
}

impl std::str::FromStr for Hand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(()),
        }
    }
}

// Charts store the hand as a single `isRightDrum` flag.
mod is_right_drum {
    use super::Hand;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hand: &Hand, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(hand.is_right())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hand, D::Error> {
        bool::deserialize(d).map(Hand::from_is_right)
    }
}

/// A cell of the lane grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lane {
    pub row: u8,
    pub column: u8,
}

impl Lane {
    pub fn new(row: u8, column: u8) -> Option<Self> {
        let lane = Self { row, column };
        lane.is_valid().then_some(lane)
    }

    /// Forces arbitrary indices into the grid.
    pub fn clamped(row: i64, column: i64) -> Self {
        Self {
            row: row.clamp(0, LANE_ROWS as i64 - 1) as u8,
            column: column.clamp(0, LANE_COLUMNS as i64 - 1) as u8,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < LANE_ROWS && (self.column as usize) < LANE_COLUMNS
    }
}

/// One scheduled hit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartNote {
    /// Seconds from track start.
    pub timing: f32,
    #[serde(flatten)]
    pub lane: Lane,
    #[serde(rename = "isRightDrum", with = "is_right_drum")]
    pub hand: Hand,
    /// Euler degrees applied after the lane's own rotation.
    #[serde(rename = "rotation", default)]
    pub approach_rotation: Vec3,
}

impl ChartNote {
    pub fn new(timing: f32, lane: Lane, hand: Hand) -> Self {
        Self {
            timing,
            lane,
            hand,
            approach_rotation: Vec3::ZERO,
        }
    }
}

/// Eight-way (plus "any") arrow direction used by imported beat charts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CutDirection {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Any,
}

const CUT_DIRECTIONS: [CutDirection; 9] = [
    CutDirection::Up,
    CutDirection::Down,
    CutDirection::Left,
    CutDirection::Right,
    CutDirection::UpLeft,
    CutDirection::UpRight,
    CutDirection::DownLeft,
    CutDirection::DownRight,
    CutDirection::Any,
];

impl CutDirection {
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| CUT_DIRECTIONS.get(i).copied())
    }

    pub const fn code(self) -> i64 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
            Self::UpLeft => 4,
            Self::UpRight => 5,
            Self::DownLeft => 6,
            Self::DownRight => 7,
            Self::Any => 8,
        }
    }

    /// Roll (about the approach axis) in degrees.
    pub const fn roll_degrees(self) -> f32 {
        match self {
            Self::Up => 180.0,
            Self::Down | Self::Any => 0.0,
            Self::Left => -90.0,
            Self::Right => 90.0,
            Self::UpLeft => -135.0,
            Self::UpRight => 135.0,
            Self::DownLeft => -45.0,
            Self::DownRight => 45.0,
        }
    }

    pub fn rotation(self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.roll_degrees())
    }

    /// Closest direction for a note rotation; only the roll is considered.
    /// Ties resolve to the lower code, so a zero roll maps to `Down`.
    pub fn nearest(rotation: Vec3) -> Self {
        let roll = rotation.z;
        let mut best = Self::Down;
        let mut best_dist = f32::INFINITY;
        for dir in CUT_DIRECTIONS {
            let dist = angular_distance(roll, dir.roll_degrees());
            if dist < best_dist {
                best = dir;
                best_dist = dist;
            }
        }
        best
    }
}

#[inline(always)]
fn angular_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::{ChartNote, CutDirection, Hand, Lane};
    use glam::Vec3;

    #[test]
    fn lane_bounds() {
        assert!(Lane::new(3, 4).is_some());
        assert!(Lane::new(4, 0).is_none());
        assert!(Lane::new(0, 5).is_none());
        assert_eq!(Lane::clamped(-2, 9), Lane { row: 0, column: 4 });
    }

    #[test]
    fn cut_direction_lookup_is_invertible() {
        for code in 0..8 {
            let dir = CutDirection::from_code(code).unwrap();
            assert_eq!(CutDirection::nearest(dir.rotation()), dir, "code {code}");
        }
        assert_eq!(CutDirection::nearest(CutDirection::Any.rotation()), CutDirection::Down);
        assert_eq!(CutDirection::nearest(Vec3::new(0.0, 0.0, 200.0)), CutDirection::Up);
        assert_eq!(CutDirection::from_code(9), None);
        assert_eq!(CutDirection::from_code(-1), None);
    }

    #[test]
    fn chart_note_json_uses_drum_flag() {
        let note = ChartNote::new(1.5, Lane::new(2, 3).unwrap(), Hand::Right);
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(
            json,
            r#"{"timing":1.5,"row":2,"column":3,"isRightDrum":true,"rotation":[0.0,0.0,0.0]}"#
        );
        let back: ChartNote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
