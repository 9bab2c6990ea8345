//! Outgoing side effects the core asks of its host: screens, sounds,
//! controller rumble and particle effects. The core never renders anything.

use crate::core::space::Pose;
use crate::game::note::Hand;

pub const SFX_POWER_DOWN: &str = "PowerDown";
pub const SFX_LEVEL_COMPLETE: &str = "LevelComplete";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    CircleBoom,
}

impl EffectKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CircleBoom => "CircleBoom",
        }
    }
}

pub trait Frontend {
    fn show_run_selection(&mut self);
    fn show_completion(&mut self, final_score: u32, max_combo: u32);
    fn show_failure(&mut self);
    fn play_sound_effect(&mut self, id: &str);
    fn trigger_haptic(&mut self, hand: Hand, amplitude: f32, duration: f32);
    fn spawn_visual_effect(&mut self, kind: EffectKind, pose: Pose);
}

/// Host that only logs what it is asked to do.
#[derive(Debug, Default)]
pub struct LogFrontend;

impl Frontend for LogFrontend {
    fn show_run_selection(&mut self) {
        log::info!("[frontend] show run selection");
    }

    fn show_completion(&mut self, final_score: u32, max_combo: u32) {
        log::info!("[frontend] level complete: score {final_score}, max combo {max_combo}");
    }

    fn show_failure(&mut self) {
        log::info!("[frontend] level failed");
    }

    fn play_sound_effect(&mut self, id: &str) {
        log::debug!("[frontend] sound '{id}'");
    }

    fn trigger_haptic(&mut self, hand: Hand, amplitude: f32, duration: f32) {
        log::debug!("[frontend] haptic {hand} amplitude {amplitude} for {duration}s");
    }

    fn spawn_visual_effect(&mut self, kind: EffectKind, pose: Pose) {
        log::trace!("[frontend] effect {} at {}", kind.name(), pose.position);
    }
}
