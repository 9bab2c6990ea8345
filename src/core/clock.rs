//! The authoritative song clock.
//!
//! Wraps a [`Transport`] with the run-level playback lifecycle: pre-roll
//! before playback, abrupt stops, linear fade-outs and relative seeks. Both
//! suspending operations (pre-roll and fade) are explicit state advanced by
//! [`SongClock::tick`]; replacing the state cancels them.

use crate::core::audio::Transport;
use log::{debug, info};

/// Volume restored whenever a run (re)starts.
pub const RESET_VOLUME: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockState {
    Idle,
    Pending { elapsed: f32 },
    Playing,
    Fading {
        elapsed: f32,
        duration: f32,
        from_volume: f32,
        /// The track already ran out; only the volume ramp remains.
        ended: bool,
    },
    Stopped,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    PlaybackStarted,
    /// Playback is over, either because the track ran out or a fade completed.
    TrackFinished { faded: bool },
}

pub struct SongClock {
    transport: Box<dyn Transport>,
    state: ClockState,
    pre_roll: f32,
    track_finished: bool,
}

impl SongClock {
    pub fn new(transport: Box<dyn Transport>, pre_roll: f32) -> Self {
        Self {
            transport,
            state: ClockState::Idle,
            pre_roll: pre_roll.max(0.0),
            track_finished: false,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Current song time, or `None` until playback has actually begun.
    /// Never reports a fake zero while idle or in pre-roll.
    #[inline(always)]
    pub fn current_time(&self) -> Option<f32> {
        match self.state {
            ClockState::Playing | ClockState::Fading { ended: false, .. } => {
                Some(self.transport.position())
            }
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, ClockState::Playing | ClockState::Fading { .. })
            && self.transport.is_playing()
    }

    pub fn track_length(&self) -> f32 {
        self.transport.length()
    }

    /// True once the track ran to its end or a fade completed, until the next
    /// `start`/`reset`.
    #[inline(always)]
    pub fn has_track_finished(&self) -> bool {
        self.track_finished
    }

    /// Stops playback, rewinds and restores the baseline volume. Cancels any
    /// pending start or running fade.
    pub fn reset(&mut self) {
        self.transport.stop();
        self.transport.set_position(0.0);
        self.transport.set_volume(RESET_VOLUME);
        self.state = ClockState::Idle;
        self.track_finished = false;
    }

    /// Rewinds and schedules playback after the configured pre-roll.
    pub fn start(&mut self) {
        self.reset();
        self.state = ClockState::Pending { elapsed: 0.0 };
        info!("Song start scheduled in {:.2}s", self.pre_roll);
    }

    /// Immediate halt without a fade.
    pub fn sudden_stop(&mut self) {
        self.transport.stop();
        self.state = ClockState::Stopped;
        info!("Song stopped abruptly");
    }

    /// Ramps the volume linearly to silence over `duration`, then stops the
    /// transport and reports [`ClockEvent::TrackFinished`]. A fade requested
    /// after the track ran out keeps reporting no song time.
    pub fn fade_out(&mut self, duration: f32) {
        match self.state {
            ClockState::Playing | ClockState::Finished => {
                self.state = ClockState::Fading {
                    elapsed: 0.0,
                    duration: duration.max(0.0),
                    from_volume: self.transport.volume(),
                    ended: self.state == ClockState::Finished,
                };
                debug!("Fading song out over {duration:.2}s");
            }
            other => debug!("Ignoring fade-out request in state {other:?}"),
        }
    }

    /// Moves playback by `delta` seconds, clamped to the track. Returns the new
    /// position; callers must resynchronise anything derived from song time.
    pub fn seek_relative(&mut self, delta: f32) -> Option<f32> {
        if self.current_time().is_none() {
            debug!("Ignoring seek in state {:?}", self.state);
            return None;
        }
        let target = (self.transport.position() + delta).clamp(0.0, self.transport.length());
        self.transport.set_position(target);
        if !self.transport.is_playing() && target < self.transport.length() {
            self.transport.play();
        }
        info!("Seeked by {delta:+.2}s to {target:.2}s");
        Some(target)
    }

    pub fn tick(&mut self, delta_time: f32) -> Option<ClockEvent> {
        match self.state {
            ClockState::Idle | ClockState::Stopped | ClockState::Finished => None,
            ClockState::Pending { elapsed } => {
                let elapsed = elapsed + delta_time;
                if elapsed >= self.pre_roll {
                    self.transport.set_position(0.0);
                    self.transport.play();
                    self.state = ClockState::Playing;
                    info!("Song playback started");
                    Some(ClockEvent::PlaybackStarted)
                } else {
                    self.state = ClockState::Pending { elapsed };
                    None
                }
            }
            ClockState::Playing => {
                self.transport.tick(delta_time);
                if self.transport.is_playing() {
                    return None;
                }
                self.state = ClockState::Finished;
                self.track_finished = true;
                info!("Track finished at {:.2}s", self.transport.position());
                Some(ClockEvent::TrackFinished { faded: false })
            }
            ClockState::Fading {
                elapsed,
                duration,
                from_volume,
                ended,
            } => {
                self.transport.tick(delta_time);
                let elapsed = elapsed + delta_time;
                let progress = if duration > 0.0 {
                    (elapsed / duration).min(1.0)
                } else {
                    1.0
                };
                self.transport.set_volume(from_volume * (1.0 - progress));
                if progress < 1.0 {
                    self.state = ClockState::Fading {
                        elapsed,
                        duration,
                        from_volume,
                        ended,
                    };
                    return None;
                }
                self.transport.stop();
                self.state = ClockState::Finished;
                self.track_finished = true;
                info!("Fade-out complete");
                Some(ClockEvent::TrackFinished { faded: true })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockEvent, ClockState, SongClock};
    use crate::core::audio::SimulatedTransport;

    fn clock(length: f32, pre_roll: f32) -> SongClock {
        SongClock::new(Box::new(SimulatedTransport::new(length)), pre_roll)
    }

    #[test]
    fn reports_no_time_until_pre_roll_elapses() {
        let mut c = clock(10.0, 0.5);
        assert_eq!(c.current_time(), None);
        c.start();
        assert_eq!(c.current_time(), None, "pending clock must not report 0.0");
        assert_eq!(c.tick(0.25), None);
        assert_eq!(c.current_time(), None);
        assert_eq!(c.tick(0.25), Some(ClockEvent::PlaybackStarted));
        assert_eq!(c.current_time(), Some(0.0));
        c.tick(0.1);
        let t = c.current_time().unwrap();
        assert!((t - 0.1).abs() <= 1e-6, "got {t}");
    }

    #[test]
    fn natural_end_sets_track_finished() {
        let mut c = clock(0.2, 0.0);
        c.start();
        c.tick(0.0);
        assert_eq!(c.tick(0.1), None);
        assert_eq!(c.tick(0.15), Some(ClockEvent::TrackFinished { faded: false }));
        assert!(c.has_track_finished());
        assert_eq!(c.current_time(), None);
    }

    #[test]
    fn fade_ramps_volume_linearly_then_stops() {
        let mut c = clock(100.0, 0.0);
        c.start();
        c.tick(0.0);
        c.fade_out(2.0);
        c.tick(0.5);
        assert!((c.transport().volume() - 0.75).abs() <= 1e-5);
        c.tick(1.0);
        assert!((c.transport().volume() - 0.25).abs() <= 1e-5);
        assert_eq!(c.tick(0.5), Some(ClockEvent::TrackFinished { faded: true }));
        assert!(c.transport().volume().abs() <= 1e-6);
        assert!(!c.transport().is_playing());
        assert_eq!(c.state(), ClockState::Finished);
    }

    #[test]
    fn fade_after_natural_end_reports_no_time() {
        let mut c = clock(0.2, 0.0);
        c.start();
        c.tick(0.0);
        assert_eq!(c.tick(0.3), Some(ClockEvent::TrackFinished { faded: false }));

        c.fade_out(1.0);
        assert!(matches!(c.state(), ClockState::Fading { ended: true, .. }));
        assert_eq!(c.current_time(), None);
        assert_eq!(c.seek_relative(-0.1), None);
        c.tick(0.5);
        assert_eq!(c.current_time(), None);
        assert!((c.transport().volume() - 0.5).abs() <= 1e-5);
        assert!(c.has_track_finished());
        assert_eq!(c.tick(0.5), Some(ClockEvent::TrackFinished { faded: true }));
        assert_eq!(c.state(), ClockState::Finished);
    }

    #[test]
    fn sudden_stop_cancels_fade_and_pending_start() {
        let mut c = clock(100.0, 0.0);
        c.start();
        c.tick(0.0);
        c.fade_out(1.0);
        c.tick(0.5);
        c.sudden_stop();
        assert_eq!(c.tick(1.0), None, "cancelled fade must not complete");
        assert!(!c.has_track_finished());

        let mut c = clock(100.0, 1.0);
        c.start();
        c.tick(0.5);
        c.reset();
        assert_eq!(c.tick(1.0), None, "cancelled start must not fire");
        assert!((c.transport().volume() - 1.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn seek_clamps_into_track() {
        let mut c = clock(10.0, 0.0);
        assert_eq!(c.seek_relative(1.0), None, "cannot seek before playback");
        c.start();
        c.tick(0.0);
        c.tick(2.0);
        assert_eq!(c.seek_relative(-5.0), Some(0.0));
        assert_eq!(c.seek_relative(50.0), Some(10.0));
    }
}
