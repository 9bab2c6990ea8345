use crate::core::space::{Pose, quat_from_euler_degrees};
use crate::game::note::{LANE_COLUMNS, LANE_ROWS, Lane};
use glam::{Quat, Vec3};
use log::info;

const DEFAULT_START_X: f32 = -2.0;
const DEFAULT_START_Y: f32 = 1.0;
const DEFAULT_SPACING_X: f32 = 1.0;
const DEFAULT_SPACING_Y: f32 = 1.0;

/// Authored pose of one grid cell. Rotation is kept as Euler degrees, the
/// way it is edited.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LanePose {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl LanePose {
    pub fn quat(&self) -> Quat {
        quat_from_euler_degrees(self.rotation)
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.quat())
    }
}

/// The fixed 4 x 5 set of target poses notes fly towards. Cells can be
/// unset, in which case notes for them are skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneGrid {
    cells: [[Option<LanePose>; LANE_COLUMNS]; LANE_ROWS],
}

impl Default for LaneGrid {
    fn default() -> Self {
        let mut grid = Self::empty();
        grid.reset_to_default();
        grid
    }
}

impl LaneGrid {
    pub const fn empty() -> Self {
        Self {
            cells: [[None; LANE_COLUMNS]; LANE_ROWS],
        }
    }

    pub fn default_pose(lane: Lane) -> LanePose {
        LanePose {
            position: Vec3::new(
                DEFAULT_START_X + f32::from(lane.column) * DEFAULT_SPACING_X,
                DEFAULT_START_Y + f32::from(lane.row) * DEFAULT_SPACING_Y,
                0.0,
            ),
            rotation: Vec3::ZERO,
        }
    }

    #[inline(always)]
    pub fn pose(&self, lane: Lane) -> Option<&LanePose> {
        self.cells
            .get(lane.row as usize)
            .and_then(|row| row.get(lane.column as usize))
            .and_then(Option::as_ref)
    }

    // --- Editing interface (never used during a run) ---

    pub fn set_pose(&mut self, lane: Lane, pose: LanePose) -> bool {
        if !lane.is_valid() {
            return false;
        }
        self.cells[lane.row as usize][lane.column as usize] = Some(pose);
        true
    }

    pub fn clear_cell(&mut self, lane: Lane) -> bool {
        if !lane.is_valid() {
            return false;
        }
        self.cells[lane.row as usize][lane.column as usize] = None;
        true
    }

    /// Fills every unset cell with the default layout; existing poses stay.
    pub fn fill_missing(&mut self) {
        for (r, row) in self.cells.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if cell.is_none() {
                    *cell = Some(Self::default_pose(Lane {
                        row: r as u8,
                        column: c as u8,
                    }));
                }
            }
        }
    }

    pub fn reset_to_default(&mut self) {
        *self = Self::empty();
        self.fill_missing();
        info!("Lane grid reset to default layout");
    }
}

#[cfg(test)]
mod tests {
    use super::{LaneGrid, LanePose};
    use crate::game::note::Lane;
    use glam::Vec3;

    #[test]
    fn default_layout_spacing() {
        let grid = LaneGrid::default();
        let p = grid.pose(Lane::new(3, 4).unwrap()).unwrap();
        assert_eq!(p.position, Vec3::new(2.0, 4.0, 0.0));
        let p = grid.pose(Lane::new(0, 0).unwrap()).unwrap();
        assert_eq!(p.position, Vec3::new(-2.0, 1.0, 0.0));
    }

    #[test]
    fn editing_and_fill_missing() {
        let mut grid = LaneGrid::default();
        let lane = Lane::new(1, 2).unwrap();
        let custom = LanePose {
            position: Vec3::new(9.0, 9.0, 1.0),
            rotation: Vec3::new(0.0, 15.0, 0.0),
        };
        assert!(grid.set_pose(lane, custom));
        assert!(grid.clear_cell(Lane::new(0, 0).unwrap()));
        assert!(grid.pose(Lane::new(0, 0).unwrap()).is_none());

        grid.fill_missing();
        assert_eq!(grid.pose(lane), Some(&custom), "fill keeps edited cells");
        assert!(grid.pose(Lane::new(0, 0).unwrap()).is_some());
        assert!(!grid.set_pose(Lane { row: 7, column: 0 }, custom));
    }
}
