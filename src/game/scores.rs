use crate::config::LifeConfig;
use crate::game::life;
use log::{debug, info};

/// Outcome fed into combo and multiplier updates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HitOutcome {
    Hit,
    Miss,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Waiting for the start trigger.
    Idle,
    Running,
    Failed,
    Completed,
}

/// Per-run score, lives, combo and multiplier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreState {
    pub score: u32,
    pub lives: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub multiplier: u32,
    multiplier_counter: u32,
    pub invincible: bool,
    pub phase: RunPhase,
    life: LifeConfig,
}

impl ScoreState {
    pub fn new(life: LifeConfig) -> Self {
        Self {
            score: 0,
            lives: life.starting_lives,
            combo: 0,
            max_combo: 0,
            multiplier: 1,
            multiplier_counter: 0,
            invincible: false,
            phase: RunPhase::Idle,
            life,
        }
    }

    #[inline(always)]
    pub fn multiplier_counter(&self) -> u32 {
        self.multiplier_counter
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    #[inline(always)]
    pub fn life_cap(&self) -> u32 {
        self.life.life_cap
    }

    /// Back to defaults for a new run. Invincibility is switched off too.
    pub fn reset(&mut self) {
        *self = Self::new(self.life);
    }

    pub fn add_score(&mut self) {
        self.score = self.score.saturating_add(self.multiplier);
    }

    pub fn update_combo(&mut self, outcome: HitOutcome) {
        match outcome {
            HitOutcome::Hit => {
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
            }
            HitOutcome::Miss => self.combo = 0,
        }
    }

    /// Streak bands: 1..=2 gives x2 (only when coming from x1), 4..=8 gives
    /// x4, 12..=16 gives x8. Streaks between bands keep the current value.
    pub fn update_multiplier(&mut self, outcome: HitOutcome) {
        match outcome {
            HitOutcome::Hit => {
                self.multiplier_counter += 1;
                let streak = self.multiplier_counter;
                let before = self.multiplier;
                if (1..=2).contains(&streak) && self.multiplier == 1 {
                    self.multiplier = 2;
                } else if (4..=8).contains(&streak) {
                    self.multiplier = 4;
                } else if (12..=16).contains(&streak) {
                    self.multiplier = 8;
                }
                if self.multiplier != before {
                    debug!("Multiplier x{before} -> x{} at streak {streak}", self.multiplier);
                }
            }
            HitOutcome::Miss => {
                self.multiplier_counter = 0;
                self.multiplier = 1;
            }
        }
    }

    /// No-op while invincible.
    pub fn lose_life(&mut self) {
        if self.invincible {
            return;
        }
        self.lives = life::after_loss(self.lives);
    }

    pub fn add_life(&mut self) {
        self.lives = life::after_gain(self.lives, self.life.life_cap);
    }

    pub fn set_invincible(&mut self, invincible: bool) {
        self.invincible = invincible;
        info!(
            "Invincibility {}",
            if invincible { "enabled" } else { "disabled" }
        );
    }

    /// Correct hit: score with the current multiplier, then advance life,
    /// multiplier and combo.
    pub fn apply_hit(&mut self) {
        self.add_score();
        self.add_life();
        self.update_multiplier(HitOutcome::Hit);
        self.update_combo(HitOutcome::Hit);
    }

    /// Wrong hit or deadline miss.
    pub fn apply_miss(&mut self) {
        self.lose_life();
        self.update_multiplier(HitOutcome::Miss);
        self.update_combo(HitOutcome::Miss);
    }

    /// Moves a running game into `Failed` the first time lives reach zero.
    pub fn check_failure(&mut self) -> bool {
        if self.phase == RunPhase::Running && life::is_depleted(self.lives) {
            self.phase = RunPhase::Failed;
            info!("Out of lives; run failed with score {}", self.score);
            return true;
        }
        false
    }
}
