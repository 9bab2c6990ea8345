//! Note scheduler: turns the chart into moving notes in lockstep with song time.
//!
//! Keeps an immutable sorted copy of the chart (`original_schedule`) and a
//! queue of notes not yet spawned. Each frame the head of the queue is spawned
//! once it is within `spawn_offset` seconds of its timing; spawned notes then
//! fly at a constant speed chosen so they reach their lane exactly on time.

use crate::config::{FieldConfig, TimingConfig};
use crate::core::space::{Aabb, move_towards, quat_from_euler_degrees};
use crate::game::chart::Chart;
use crate::game::lane_grid::LaneGrid;
use crate::game::note::{ChartNote, Hand, Lane};
use glam::{Quat, Vec3};
use log::{debug, info, warn};
use std::collections::VecDeque;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(pub u64);

/// A spawned note in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveNote {
    pub id: NoteId,
    pub hand: Hand,
    pub lane: Lane,
    /// Chart time at which the note reaches `hit_position`.
    pub timing: f32,
    pub position: Vec3,
    /// Position before the most recent motion step.
    pub previous_position: Vec3,
    pub target_position: Vec3,
    /// The lane's grid position.
    pub hit_position: Vec3,
    pub rotation: Quat,
    pub speed: f32,
}

impl LiveNote {
    #[inline(always)]
    pub fn volume(&self, half_extent: f32) -> Aabb {
        Aabb::cube(self.position, half_extent)
    }

    /// Displacement over the last motion step.
    #[inline(always)]
    pub fn last_motion(&self) -> Vec3 {
        self.position - self.previous_position
    }
}

pub struct NoteScheduler {
    grid: LaneGrid,
    timing: TimingConfig,
    field: FieldConfig,
    original_schedule: Vec<ChartNote>,
    pending: VecDeque<ChartNote>,
    live: Vec<LiveNote>,
    next_id: u64,
    completion_fired: bool,
}

impl NoteScheduler {
    pub fn new(grid: LaneGrid, timing: &TimingConfig, field: &FieldConfig) -> Self {
        Self {
            grid,
            timing: *timing,
            field: *field,
            original_schedule: Vec::new(),
            pending: VecDeque::new(),
            live: Vec::new(),
            next_id: 0,
            completion_fired: false,
        }
    }

    /// Replaces the schedule with a sorted copy of `chart` and resets all
    /// run state.
    pub fn load(&mut self, chart: &Chart) {
        let mut schedule = chart.notes.clone();
        schedule.sort_by(|a, b| a.timing.total_cmp(&b.timing));
        self.original_schedule = schedule;
        self.reset();
        info!(
            "Scheduled {} notes for '{}'",
            self.original_schedule.len(),
            chart.song_name
        );
    }

    pub fn grid(&self) -> &LaneGrid {
        &self.grid
    }

    pub fn original_schedule(&self) -> &[ChartNote] {
        &self.original_schedule
    }

    pub fn pending(&self) -> &VecDeque<ChartNote> {
        &self.pending
    }

    pub fn live_notes(&self) -> &[LiveNote] {
        &self.live
    }

    pub fn live_note(&self, id: NoteId) -> Option<&LiveNote> {
        self.live.iter().find(|n| n.id == id)
    }

    #[inline(always)]
    pub fn is_completion_fired(&self) -> bool {
        self.completion_fired
    }

    /// Latest chart time that is due to spawn at song time `time`.
    #[inline(always)]
    fn spawn_threshold(&self, time: f32) -> f32 {
        time + self.timing.spawn_offset - self.timing.spawn_delay
    }

    /// Spawns every pending note whose lead time has been reached, in chart
    /// order. Returns the ids of the notes that entered play.
    pub fn spawn_due(&mut self, time: f32) -> Vec<NoteId> {
        let threshold = self.spawn_threshold(time);
        let due = self
            .pending
            .iter()
            .take_while(|n| n.timing <= threshold)
            .count();

        let due_notes: Vec<ChartNote> = self.pending.drain(..due).collect();
        let mut spawned = Vec::with_capacity(due);
        for note in due_notes {
            if let Some(id) = self.spawn(&note) {
                spawned.push(id);
            }
        }
        spawned
    }

    fn spawn(&mut self, note: &ChartNote) -> Option<NoteId> {
        let Some(cell) = self.grid.pose(note.lane).copied() else {
            warn!(
                "No lane grid pose for row {}, column {}; skipping note at {:.3}s",
                note.lane.row, note.lane.column, note.timing
            );
            return None;
        };

        let grid_xy = cell.position;
        let spawn_position = Vec3::new(grid_xy.x, grid_xy.y, self.field.spawn_depth);
        let target_position = Vec3::new(grid_xy.x, grid_xy.y, self.field.target_depth());
        let travel_distance = (self.field.spawn_depth - grid_xy.z).abs();
        let speed = travel_distance / self.timing.spawn_offset;
        // Lane rotation first, then the note's own approach rotation.
        let rotation = cell.quat() * quat_from_euler_degrees(note.approach_rotation);

        let id = NoteId(self.next_id);
        self.next_id += 1;
        self.live.push(LiveNote {
            id,
            hand: note.hand,
            lane: note.lane,
            timing: note.timing,
            position: spawn_position,
            previous_position: spawn_position,
            target_position,
            hit_position: grid_xy,
            rotation,
            speed,
        });
        debug!(
            "Spawned {:?} {} note for {:.3}s at row {}, column {}",
            id, note.hand, note.timing, note.lane.row, note.lane.column
        );
        Some(id)
    }

    /// Moves every live note one frame towards its target at constant speed.
    pub fn advance(&mut self, delta_time: f32) {
        for note in &mut self.live {
            note.previous_position = note.position;
            note.position =
                move_towards(note.position, note.target_position, note.speed * delta_time);
        }
    }

    /// Removes and returns notes that crossed the death boundary unjudged.
    pub fn take_missed(&mut self) -> Vec<LiveNote> {
        let boundary = self.field.death_boundary();
        if !self.live.iter().any(|n| n.position.z < boundary) {
            return Vec::new();
        }
        let (missed, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(|n| n.position.z < boundary);
        self.live = live;
        missed
    }

    /// Removes a live note so it can be judged. Returns `None` if it was
    /// already consumed, which makes every note judgeable at most once.
    pub fn consume(&mut self, id: NoteId) -> Option<LiveNote> {
        let idx = self.live.iter().position(|n| n.id == id)?;
        Some(self.live.remove(idx))
    }

    pub fn clear_live(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        n
    }

    /// Refills the pending queue from the original schedule.
    pub fn reset_pending_queue(&mut self) {
        self.pending = self.original_schedule.iter().copied().collect();
    }

    /// Re-aligns with a new song time after a seek: live notes are dropped and
    /// only notes at or after `time` stay pending.
    pub fn resync_to(&mut self, time: f32) {
        let cleared = self.clear_live();
        self.reset_pending_queue();
        self.pending.retain(|n| n.timing >= time);
        info!(
            "Resynced to {time:.2}s: cleared {cleared} live notes, {} pending",
            self.pending.len()
        );
    }

    /// Back to the state right after `load`.
    pub fn reset(&mut self) {
        self.clear_live();
        self.reset_pending_queue();
        self.completion_fired = false;
    }

    /// Fires once per run when everything has been spawned and resolved and
    /// the track is over (or within the trailing window of its length).
    pub fn check_completion(
        &mut self,
        song_time: Option<f32>,
        track_finished: bool,
        track_length: f32,
    ) -> bool {
        if self.completion_fired || !self.pending.is_empty() || !self.live.is_empty() {
            return false;
        }
        let near_end =
            song_time.is_some_and(|t| t >= track_length - self.timing.completion_window);
        if track_finished || near_end {
            self.completion_fired = true;
            info!("All notes resolved and track over; level complete");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::NoteScheduler;
    use crate::config::Config;
    use crate::game::chart::Chart;
    use crate::game::lane_grid::{LaneGrid, LanePose};
    use crate::game::note::{ChartNote, Hand, Lane};
    use glam::Vec3;

    fn scheduler(notes: &[(f32, u8, u8, Hand)]) -> NoteScheduler {
        let cfg = Config::default();
        let mut s = NoteScheduler::new(LaneGrid::default(), &cfg.timing, &cfg.field);
        let mut chart = Chart::new("test");
        for &(t, row, col, hand) in notes {
            chart.notes.push(ChartNote::new(t, Lane::new(row, col).unwrap(), hand));
        }
        s.load(&chart);
        s
    }

    #[test]
    fn spawns_in_timing_order_at_lead_time() {
        let mut s = scheduler(&[
            (5.0, 0, 0, Hand::Left),
            (2.0, 1, 1, Hand::Right),
            (2.0, 2, 2, Hand::Left),
            (3.0, 3, 3, Hand::Right),
        ]);
        assert!(s.spawn_due(-0.1).is_empty());
        assert_eq!(s.spawn_due(0.0).len(), 2, "both 2.0s notes spawn at 0.0");
        assert_eq!(s.spawn_due(0.5).len(), 0);
        assert_eq!(s.spawn_due(1.0).len(), 1);
        assert_eq!(s.spawn_due(10.0).len(), 1);

        let timings: Vec<f32> = s.live_notes().iter().map(|n| n.timing).collect();
        assert!(timings.windows(2).all(|w| w[0] <= w[1]), "got {timings:?}");
        assert!(s.pending().is_empty());
    }

    #[test]
    fn spawn_delay_holds_notes_back() {
        let mut cfg = Config::default();
        cfg.timing.spawn_delay = 0.5;
        let mut s = NoteScheduler::new(LaneGrid::default(), &cfg.timing, &cfg.field);
        let mut chart = Chart::new("delayed");
        chart.notes.push(ChartNote::new(2.0, Lane::new(0, 0).unwrap(), Hand::Left));
        s.load(&chart);

        assert!(s.spawn_due(0.0).is_empty());
        assert!(s.spawn_due(0.25).is_empty());
        assert_eq!(s.spawn_due(0.5).len(), 1);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn note_reaches_grid_on_its_timing() {
        let mut s = scheduler(&[(2.0, 0, 0, Hand::Right)]);
        let dt = 1.0 / 90.0;
        let mut t = 0.0_f32;
        s.spawn_due(t);
        let note = s.live_notes()[0].clone();
        assert_eq!(note.position.z, 30.0);
        assert!((note.speed - 15.0).abs() <= 1e-5);

        let mut arrival = None;
        while t < 3.0 && arrival.is_none() {
            t += dt;
            s.advance(dt);
            if s.live_notes()[0].position.z <= note.hit_position.z {
                arrival = Some(t);
            }
        }
        let arrival = arrival.expect("note never reached its lane");
        assert!((arrival - 2.0).abs() <= dt * 1.5, "arrived at {arrival}");
    }

    #[test]
    fn spawn_pose_composes_grid_then_note_rotation() {
        let cfg = Config::default();
        let mut grid = LaneGrid::default();
        let lane = Lane::new(0, 0).unwrap();
        grid.set_pose(
            lane,
            LanePose {
                position: Vec3::new(1.0, 2.0, 0.0),
                rotation: Vec3::new(0.0, 90.0, 0.0),
            },
        );
        let mut s = NoteScheduler::new(grid.clone(), &cfg.timing, &cfg.field);
        let mut chart = Chart::new("rot");
        let mut note = ChartNote::new(2.0, lane, Hand::Left);
        note.approach_rotation = Vec3::new(0.0, 0.0, 90.0);
        chart.notes.push(note);
        s.load(&chart);
        s.spawn_due(0.0);

        let live = &s.live_notes()[0];
        let expected = grid.pose(lane).unwrap().quat()
            * crate::core::space::quat_from_euler_degrees(note.approach_rotation);
        assert!(live.rotation.abs_diff_eq(expected, 1e-5));
        assert_eq!(live.position, Vec3::new(1.0, 2.0, 30.0));
        assert_eq!(live.target_position, Vec3::new(1.0, 2.0, -22.0));
    }

    #[test]
    fn missing_grid_cell_skips_note() {
        let cfg = Config::default();
        let mut grid = LaneGrid::default();
        grid.clear_cell(Lane::new(1, 1).unwrap());
        let mut s = NoteScheduler::new(grid, &cfg.timing, &cfg.field);
        let mut chart = Chart::new("holes");
        chart.notes.push(ChartNote::new(1.0, Lane::new(1, 1).unwrap(), Hand::Left));
        chart.notes.push(ChartNote::new(1.0, Lane::new(0, 1).unwrap(), Hand::Left));
        s.load(&chart);
        assert_eq!(s.spawn_due(0.0).len(), 1);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn unjudged_notes_are_missed_past_the_death_boundary() {
        let mut s = scheduler(&[(2.0, 0, 0, Hand::Right)]);
        s.spawn_due(0.0);
        s.advance(2.0);
        assert!(s.take_missed().is_empty(), "at the grid the note is still live");
        s.advance(0.3);
        let missed = s.take_missed();
        assert_eq!(missed.len(), 1);
        assert!(s.live_notes().is_empty());
    }

    #[test]
    fn consume_is_at_most_once() {
        let mut s = scheduler(&[(2.0, 0, 0, Hand::Right)]);
        let id = s.spawn_due(0.0)[0];
        assert!(s.consume(id).is_some());
        assert!(s.consume(id).is_none());
    }

    #[test]
    fn resync_keeps_only_future_notes() {
        let mut s = scheduler(&[
            (1.0, 0, 0, Hand::Left),
            (2.0, 0, 1, Hand::Left),
            (3.0, 0, 2, Hand::Right),
            (4.0, 0, 3, Hand::Right),
        ]);
        s.spawn_due(2.5);
        assert_eq!(s.live_notes().len(), 4);
        s.resync_to(2.0);
        assert!(s.live_notes().is_empty());
        let pending: Vec<f32> = s.pending().iter().map(|n| n.timing).collect();
        assert_eq!(pending, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn completion_needs_empty_queues_and_track_end() {
        let mut s = scheduler(&[(1.0, 0, 0, Hand::Left)]);
        assert!(!s.check_completion(Some(100.0), true, 100.0), "pending note blocks");
        let id = s.spawn_due(0.0)[0];
        assert!(!s.check_completion(Some(100.0), true, 100.0), "live note blocks");
        s.consume(id);
        assert!(!s.check_completion(Some(50.0), false, 100.0), "track still playing");
        assert!(s.check_completion(Some(99.9), false, 100.0), "inside trailing window");
        assert!(!s.check_completion(None, true, 100.0), "fires once");
        s.reset();
        assert!(!s.is_completion_fired());
    }
}
