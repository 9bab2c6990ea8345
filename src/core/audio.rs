//! The music transport, treated as a black box.
//!
//! The engine only ever asks a transport where playback is and whether it is
//! still running; decoding and mixing live behind this trait.

use log::debug;

pub trait Transport {
    /// Begin (or resume) playback from the current position.
    fn play(&mut self);
    /// Halt playback, keeping the current position.
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    /// Playback position in seconds.
    fn position(&self) -> f32;
    fn set_position(&mut self, seconds: f32);
    /// Nominal length of the loaded track in seconds.
    fn length(&self) -> f32;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    /// Advance by one frame. Device-driven transports move on their own and
    /// can ignore this.
    fn tick(&mut self, _delta_time: f32) {}
}

/// A transport whose position advances only through `tick`. Used for headless
/// runs and tests, where playback must be deterministic.
#[derive(Clone, Debug)]
pub struct SimulatedTransport {
    position: f32,
    length: f32,
    volume: f32,
    playing: bool,
}

impl SimulatedTransport {
    pub fn new(length: f32) -> Self {
        Self {
            position: 0.0,
            length: length.max(0.0),
            volume: 1.0,
            playing: false,
        }
    }
}

impl Transport for SimulatedTransport {
    fn play(&mut self) {
        self.playing = self.position < self.length;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f32 {
        self.position
    }

    fn set_position(&mut self, seconds: f32) {
        self.position = seconds.clamp(0.0, self.length);
    }

    fn length(&self) -> f32 {
        self.length
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn tick(&mut self, delta_time: f32) {
        if !self.playing {
            return;
        }
        self.position += delta_time.max(0.0);
        if self.position >= self.length {
            self.position = self.length;
            self.playing = false;
            debug!("Simulated track reached its end at {:.3}s", self.length);
        }
    }
}
