use crate::game::judgment::StickInput;
use crate::game::note::Hand;
use crate::game::scheduler::{LiveNote, NoteScheduler};
use glam::Vec3;

/// How long before arrival a stick is placed in the note's lane.
pub const DEFAULT_LEAD_SECONDS: f32 = 0.1;

// Below the lane grid, out of every note's path.
const REST_LEFT: Vec3 = Vec3::new(-3.0, -5.0, 1.0);
const REST_RIGHT: Vec3 = Vec3::new(3.0, -5.0, 1.0);

/// Scripted drumsticks: each stick waits at rest and jumps into the lane of
/// its next note just before it arrives. Optionally lets every n-th note
/// through to exercise the miss path.
#[derive(Clone, Debug)]
pub struct Autoplay {
    lead_seconds: f32,
    miss_every: u32,
}

impl Default for Autoplay {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Autoplay {
    /// `miss_every == 0` plays every note.
    pub fn new(miss_every: u32) -> Self {
        Self {
            lead_seconds: DEFAULT_LEAD_SECONDS,
            miss_every,
        }
    }

    #[inline(always)]
    fn skips(&self, note: &LiveNote) -> bool {
        self.miss_every > 0 && (note.id.0 + 1) % u64::from(self.miss_every) == 0
    }

    fn target<'a>(&self, scheduler: &'a NoteScheduler, hand: Hand) -> Option<&'a LiveNote> {
        scheduler
            .live_notes()
            .iter()
            .filter(|n| n.hand == hand && n.position.z >= n.hit_position.z && !self.skips(n))
            .min_by(|a, b| a.timing.total_cmp(&b.timing))
    }

    fn stick_for(&self, scheduler: &NoteScheduler, hand: Hand) -> StickInput {
        let rest = match hand {
            Hand::Left => REST_LEFT,
            Hand::Right => REST_RIGHT,
        };
        let tip = self
            .target(scheduler, hand)
            .filter(|n| n.position.z - n.hit_position.z <= n.speed * self.lead_seconds)
            .map_or(rest, |n| n.hit_position);
        StickInput::teleport(hand, tip)
    }

    pub fn sticks(&self, scheduler: &NoteScheduler) -> [StickInput; 2] {
        [
            self.stick_for(scheduler, Hand::Left),
            self.stick_for(scheduler, Hand::Right),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{Autoplay, REST_LEFT, REST_RIGHT};
    use crate::config::Config;
    use crate::game::chart::Chart;
    use crate::game::lane_grid::LaneGrid;
    use crate::game::note::{ChartNote, Hand, Lane};
    use crate::game::scheduler::NoteScheduler;

    #[test]
    fn sticks_wait_at_rest_until_the_note_is_close() {
        let cfg = Config::default();
        let mut s = NoteScheduler::new(LaneGrid::default(), &cfg.timing, &cfg.field);
        let mut chart = Chart::new("auto");
        chart.notes.push(ChartNote::new(2.0, Lane::new(1, 2).unwrap(), Hand::Left));
        s.load(&chart);
        s.spawn_due(0.0);

        let auto = Autoplay::default();
        let [left, right] = auto.sticks(&s);
        assert_eq!(left.tip, REST_LEFT);
        assert_eq!(right.tip, REST_RIGHT);

        s.advance(1.95);
        let [left, right] = auto.sticks(&s);
        assert_eq!(left.tip, s.live_notes()[0].hit_position);
        assert_eq!(right.tip, REST_RIGHT);
    }

    #[test]
    fn miss_every_skips_by_spawn_order() {
        let cfg = Config::default();
        let mut s = NoteScheduler::new(LaneGrid::default(), &cfg.timing, &cfg.field);
        let mut chart = Chart::new("auto");
        chart.notes.push(ChartNote::new(2.0, Lane::new(0, 0).unwrap(), Hand::Right));
        chart.notes.push(ChartNote::new(2.0, Lane::new(0, 1).unwrap(), Hand::Right));
        s.load(&chart);
        s.spawn_due(0.0);
        s.advance(1.95);

        let [_, right] = Autoplay::new(1).sticks(&s);
        assert_eq!(right.tip, REST_RIGHT, "every note skipped");
        let [_, right] = Autoplay::new(2).sticks(&s);
        assert_eq!(right.tip, s.live_notes()[0].hit_position);
    }
}
