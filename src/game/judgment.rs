//! Hit judge: spatial contact between drumstick tips and live notes.
//!
//! Each frame the tip of every stick is swept from its previous position to
//! its current one and tested against every live note's box, which itself
//! moved over the same frame. The first contact consumes the note from the
//! scheduler, so a note can produce at most one judgment.

use crate::config::JudgeConfig;
use crate::core::space::{Aabb, swept_sphere_hits_box};
use crate::game::note::Hand;
use crate::game::scheduler::{LiveNote, NoteId, NoteScheduler};
use glam::Vec3;
use log::{debug, info};
use smallvec::SmallVec;

/// Where a stick's tip is this frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StickInput {
    pub hand: Hand,
    pub tip: Vec3,
    /// Jump straight to `tip` without sweeping the path in between.
    pub teleport: bool,
}

impl StickInput {
    pub const fn new(hand: Hand, tip: Vec3) -> Self {
        Self {
            hand,
            tip,
            teleport: false,
        }
    }

    pub const fn teleport(hand: Hand, tip: Vec3) -> Self {
        Self {
            hand,
            tip,
            teleport: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum JudgeEvent {
    /// A stick touched the start trigger.
    StartRun,
    CorrectHit { note: LiveNote },
    WrongHit { note: LiveNote, stick: Hand },
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Contact {
    note: NoteId,
    volume: Aabb,
}

#[derive(Clone, Debug)]
pub struct Drumstick {
    pub hand: Hand,
    pub radius: f32,
    tip: Option<Vec3>,
    previous_tip: Option<Vec3>,
    contacts: SmallVec<[Contact; 4]>,
}

impl Drumstick {
    pub fn new(hand: Hand, radius: f32) -> Self {
        Self {
            hand,
            radius,
            tip: None,
            previous_tip: None,
            contacts: SmallVec::new(),
        }
    }

    pub fn tip(&self) -> Option<Vec3> {
        self.tip
    }

    fn move_to(&mut self, tip: Vec3, teleport: bool) {
        self.previous_tip = if teleport { Some(tip) } else { self.tip.or(Some(tip)) };
        self.tip = Some(tip);
    }

    /// Segment swept by the tip since the last settle.
    fn sweep(&self) -> Option<(Vec3, Vec3)> {
        let end = self.tip?;
        Some((self.previous_tip.unwrap_or(end), end))
    }

    /// Collapses the sweep onto the resting tip so a segment is judged once.
    fn settle(&mut self) {
        self.previous_tip = self.tip;
    }

    pub fn is_touching(&self, note: NoteId) -> bool {
        self.contacts.iter().any(|c| c.note == note)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    fn release_stale_contacts(&mut self) {
        let Some(tip) = self.tip else {
            self.contacts.clear();
            return;
        };
        let radius = self.radius;
        self.contacts.retain(|c| c.volume.touches_sphere(tip, radius));
    }
}

pub struct HitJudge {
    sticks: [Drumstick; 2],
    note_half_extent: f32,
    start_trigger: Option<Aabb>,
    armed_trigger: Option<Aabb>,
}

#[inline(always)]
const fn stick_index(hand: Hand) -> usize {
    match hand {
        Hand::Left => 0,
        Hand::Right => 1,
    }
}

impl HitJudge {
    pub fn new(cfg: &JudgeConfig) -> Self {
        Self {
            sticks: [
                Drumstick::new(Hand::Left, cfg.stick_radius),
                Drumstick::new(Hand::Right, cfg.stick_radius),
            ],
            note_half_extent: cfg.note_half_extent,
            start_trigger: None,
            armed_trigger: None,
        }
    }

    pub fn stick(&self, hand: Hand) -> &Drumstick {
        &self.sticks[stick_index(hand)]
    }

    /// Places the start trigger; it stays armed until a stick touches it.
    pub fn set_start_trigger(&mut self, volume: Option<Aabb>) {
        self.start_trigger = volume;
        self.armed_trigger = volume;
    }

    pub fn is_start_trigger_armed(&self) -> bool {
        self.armed_trigger.is_some()
    }

    pub fn apply_input(&mut self, input: &StickInput) {
        self.sticks[stick_index(input.hand)].move_to(input.tip, input.teleport);
    }

    /// Drops every contact, e.g. after a seek removed the notes they refer to.
    pub fn clear_contacts(&mut self) {
        for stick in &mut self.sticks {
            stick.contacts.clear();
        }
    }

    /// Ends the frame: a stick that gets no new input stays where it is.
    pub fn end_frame(&mut self) {
        for stick in &mut self.sticks {
            stick.settle();
        }
    }

    /// Clears contacts, forgets tip history and re-arms the start trigger.
    pub fn reset(&mut self) {
        for stick in &mut self.sticks {
            stick.contacts.clear();
            stick.tip = None;
            stick.previous_tip = None;
        }
        self.armed_trigger = self.start_trigger;
    }

    /// Fires once when either stick sweeps through the armed trigger.
    pub fn check_start_trigger(&mut self) -> Option<JudgeEvent> {
        let trigger = self.armed_trigger?;
        let touched = self.sticks.iter().any(|stick| {
            stick.sweep().is_some_and(|(a, b)| {
                swept_sphere_hits_box(a, b, stick.radius, &trigger, Vec3::ZERO)
            })
        });
        if !touched {
            return None;
        }
        self.armed_trigger = None;
        info!("Start trigger touched");
        Some(JudgeEvent::StartRun)
    }

    /// Judges this frame's contacts against the scheduler's live notes,
    /// consuming each note that was touched.
    ///
    /// When both sticks reach the same note in one frame, the stick of the
    /// note's own hand wins.
    pub fn judge(&mut self, scheduler: &mut NoteScheduler) -> Vec<JudgeEvent> {
        for stick in &mut self.sticks {
            stick.release_stale_contacts();
        }

        let mut touches: SmallVec<[(NoteId, bool, usize); 4]> = SmallVec::new();
        for (idx, stick) in self.sticks.iter().enumerate() {
            let Some((start, end)) = stick.sweep() else {
                continue;
            };
            for note in scheduler.live_notes() {
                if stick.is_touching(note.id) {
                    continue;
                }
                let volume = note.volume(self.note_half_extent);
                if swept_sphere_hits_box(start, end, stick.radius, &volume, note.last_motion()) {
                    touches.push((note.id, note.hand != stick.hand, idx));
                }
            }
        }
        touches.sort_by_key(|&(id, wrong, _)| (id, wrong));

        let mut events = Vec::with_capacity(touches.len());
        for (id, _, idx) in touches {
            let Some(note) = scheduler.consume(id) else {
                continue;
            };
            let stick = &mut self.sticks[idx];
            stick.contacts.push(Contact {
                note: id,
                volume: note.volume(self.note_half_extent),
            });
            if note.hand == stick.hand {
                debug!("Correct {} hit on {:?} ({:.3}s)", stick.hand, id, note.timing);
                events.push(JudgeEvent::CorrectHit { note });
            } else {
                debug!(
                    "Wrong hit: {} stick on {} note {:?} ({:.3}s)",
                    stick.hand, note.hand, id, note.timing
                );
                events.push(JudgeEvent::WrongHit {
                    note,
                    stick: stick.hand,
                });
            }
        }
        self.end_frame();
        events
    }
}
